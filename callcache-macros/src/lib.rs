use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

use callcache_macro_utils::{cached_output, generate_key_expr, generate_pool, parse_attributes};

/// A procedural macro that memoizes a function or method.
///
/// The function gets its own static pool, named after the function (or the
/// `name` attribute) and registered so that
/// `callcache::clear_cache("name")` can empty it. Concurrent calls with the
/// same arguments run the body at most once per expiration window; the other
/// callers block until the result is available.
///
/// # Requirements
///
/// - **Arguments**: Plain identifiers whose types implement `CacheableKey`
///   (or `DefaultCacheableKey` + `Debug`). `&self` receivers contribute
///   `self.to_cache_key()` to the key
/// - **Return type**: Must implement `Clone + Send + Sync` and must not
///   mention `Self` or generic parameters (the pool is a `static`)
/// - **Dependencies**: The expansion refers to `::callcache_core`
///
/// # Macro Parameters
///
/// - `ttl` (optional): Time-to-live, as a duration string (`"1h30m"`, `"2d"`,
///   `"45s"`) or a number of seconds (`90`, `0.5`). Zero or negative disables
///   caching
/// - `count` (optional): Number of calls served by one computation, the
///   computing call included
/// - `name` (optional): Name of the cache in the registry and the statistics
///   registry. Default: the function name
///
/// Without `ttl` or `count`, values are kept until the cache is cleared.
/// Malformed values, and `ttl` together with `count`, are compile errors.
///
/// # Cache Behavior
///
/// - **Regular functions**: All results are cached
/// - **Result-returning functions**: Only `Ok` values are cached; an `Err` is
///   returned to its caller and the next call runs the body again
/// - **Recursion**: Recursive calls with other arguments are fine; a call that
///   recurses with its own arguments deadlocks
///
/// # Examples
///
/// ```ignore
/// use callcache::cached;
///
/// #[cached]
/// fn fibonacci(n: u64) -> u64 {
///     if n <= 1 {
///         return n;
///     }
///     fibonacci(n - 1) + fibonacci(n - 2)
/// }
///
/// #[cached(ttl = "1h30m", name = "exchange_rates")]
/// fn rate(from: &str, to: &str) -> Result<f64, String> {
///     fetch_rate(from, to)
/// }
///
/// #[derive(Debug)]
/// struct Catalog {
///     region: String,
/// }
/// impl callcache::DefaultCacheableKey for Catalog {}
///
/// impl Catalog {
///     #[cached(count = 100)]
///     fn price(&self, sku: u32) -> u64 {
///         lookup_price(&self.region, sku)
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn cached(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = match parse_attributes(attr.into()) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };

    let input = parse_macro_input!(item as ItemFn);
    let fn_attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;

    if let Some(asyncness) = &sig.asyncness {
        return syn::Error::new_spanned(asyncness, "use `#[cached_async]` for async functions")
            .to_compile_error()
            .into();
    }

    let key_expr = match generate_key_expr(sig) {
        Ok(key_expr) => key_expr,
        Err(err) => return err.into(),
    };

    let output = cached_output(&sig.output);
    let ret_type = &output.ret_type;
    let name = attrs
        .custom_name
        .unwrap_or_else(|| sig.ident.to_string());
    let pool = generate_pool(
        &name,
        &attrs.policy,
        &output.value_type,
        quote! { ::callcache_core::Blocking },
    );

    let lookup = if output.is_result {
        quote! { __CALLCACHE_POOL.get_or_try_compute(__key, || -> #ret_type #block) }
    } else {
        quote! { __CALLCACHE_POOL.get_or_compute(__key, || -> #ret_type #block) }
    };

    let expanded = quote! {
        #(#fn_attrs)*
        #vis #sig {
            #pool
            let __key = #key_expr;
            #lookup
        }
    };

    TokenStream::from(expanded)
}
