use callcache::{
    CacheError, CachedMember, ExpirationPolicy, InstanceCache, InvocationKey, TypeCache,
    TypeCacheConfig,
};
use once_cell::sync::Lazy;

static REPORT_CACHE: Lazy<TypeCache> = Lazy::new(|| {
    TypeCacheConfig::new("Report")
        .members(["summary", "page", "generated_at"])
        .exclude("generated_at")
        .shared(true)
        .policy(ExpirationPolicy::ttl_str("10m").expect("valid ttl"))
        .build()
        .expect("valid cache configuration")
});

struct Report {
    title: String,
    cache: InstanceCache,
    summary: CachedMember<String>,
    page: CachedMember<String>,
    generated_at: CachedMember<u128>,
}

impl Report {
    fn new(title: &str) -> Result<Self, CacheError> {
        let cache = REPORT_CACHE.instance();
        Ok(Self {
            title: title.to_string(),
            summary: cache.member("summary")?,
            page: cache.member("page")?,
            generated_at: cache.member("generated_at")?,
            cache,
        })
    }

    fn summary(&self) -> String {
        self.summary.get(|| {
            println!("  building summary of {:?}", self.title);
            format!("summary of {}", self.title)
        })
    }

    fn page(&self, number: u32) -> String {
        self.page.call(InvocationKey::new().arg(&number), || {
            println!("  rendering page {number}");
            format!("{} - page {number}", self.title)
        })
    }

    fn generated_at(&self) -> u128 {
        self.generated_at.get(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default()
        })
    }
}

fn main() -> Result<(), CacheError> {
    let q1 = Report::new("Q1")?;
    let q2 = Report::new("Q2")?;

    println!("q1 summary: {}", q1.summary());
    // The pool is shared by every Report, so q2 sees the summary computed by q1.
    println!("q2 summary: {}", q2.summary());

    println!("q1 page 1: {}", q1.page(1));
    println!("q1 page 1: {}", q1.page(1));
    println!("q1 page 2: {}", q1.page(2));

    // Excluded members are never cached.
    println!("generated at {}", q1.generated_at());
    println!("generated at {}", q1.generated_at());

    println!("cached entries: {}", q1.cache.len());
    callcache::clear_cache("Report")?;
    println!("q2 summary after clear: {}", q2.summary());
    Ok(())
}
