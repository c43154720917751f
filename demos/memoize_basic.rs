use callcache::{cached, clear_cache, stats_registry, CacheableKey, DefaultCacheableKey};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Product {
    id: u32,
    name: String,
}

// Use default cache key implementation
impl DefaultCacheableKey for Product {}

#[derive(Debug, Clone)]
struct Customer {
    id: u64,
    tier: String,
}

// Custom cache key implementation
impl CacheableKey for Customer {
    fn to_cache_key(&self) -> String {
        format!("customer:{}", self.id)
    }
}

#[cached(name = "prices")]
fn compute_price(p: Product, customer: &Customer) -> f64 {
    println!("Calculating price of {} for customer {}", p.name, customer.id);
    let discount = if customer.tier == "gold" { 0.9 } else { 1.0 };
    f64::from(p.id) * 10.0 * discount
}

#[cached(ttl = "1s")]
fn exchange_rate(currency: &str) -> f64 {
    println!("Fetching exchange rate for {currency}");
    if currency == "EUR" {
        1.08
    } else {
        1.0
    }
}

#[cached(count = 2)]
fn risky_operation(x: u32) -> Result<u32, String> {
    println!("Running risky operation for {x}");
    if x % 2 == 0 {
        Ok(x * 2)
    } else {
        Err(format!("Odd number: {x}"))
    }
}

fn main() {
    let book = Product {
        id: 1,
        name: "Book".to_string(),
    };
    let alice = Customer {
        id: 7,
        tier: "gold".to_string(),
    };

    println!("First call: {}", compute_price(book.clone(), &alice));
    println!("Second call (cached): {}", compute_price(book.clone(), &alice));

    println!("Rate: {}", exchange_rate("EUR"));
    println!("Rate (cached): {}", exchange_rate("EUR"));
    thread::sleep(Duration::from_millis(1100));
    println!("Rate (expired): {}", exchange_rate("EUR"));

    println!("Result 1: {:?}", risky_operation(2));
    println!("Result 2 (cached): {:?}", risky_operation(2));
    println!("Result 3 (recomputed): {:?}", risky_operation(2));
    println!("Result 4 (error, not cached): {:?}", risky_operation(3));

    if let Some(stats) = stats_registry::get("prices") {
        println!(
            "prices: {} hits, {} misses ({:.0}% hit rate)",
            stats.hits(),
            stats.misses(),
            stats.hit_rate() * 100.0
        );
    }

    clear_cache("prices").expect("prices is registered");
    println!("After clear: {}", compute_price(book, &alice));
}
