use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

use callcache_macro_utils::{cached_output, generate_key_expr, generate_pool, parse_attributes};

/// A procedural macro that memoizes an async function or method.
///
/// Accepts the same attributes as `#[cached]` (`ttl`, `count`, `name`). Tasks
/// calling the function with the same arguments while the body is running are
/// suspended, not blocked, and receive the result of the single running
/// computation. Cache hits complete without suspending.
///
/// # Requirements
///
/// - **Function must be async**: The function must be declared with `async fn`
/// - **Arguments**: Plain identifiers whose types implement `CacheableKey`
/// - **Return type**: Must implement `Clone + Send + Sync` and must not
///   mention `Self` or generic parameters
///
/// # Cache Behavior
///
/// - **Result-returning functions**: Only `Ok` values are cached
/// - **Cancellation**: If the future running the body is dropped, the entry
///   stays stale and the next caller runs the body again
///
/// # Examples
///
/// ```ignore
/// use callcache_async::cached_async;
/// use std::time::Duration;
///
/// #[cached_async(ttl = "30s")]
/// async fn fetch_user(id: u64) -> Result<User, ApiError> {
///     client().get_user(id).await
/// }
///
/// #[cached_async(count = 3, name = "quotes")]
/// async fn quote(symbol: String) -> f64 {
///     tokio::time::sleep(Duration::from_millis(50)).await;
///     market_price(&symbol)
/// }
/// ```
#[proc_macro_attribute]
pub fn cached_async(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = match parse_attributes(attr.into()) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };

    let input = parse_macro_input!(item as ItemFn);
    let fn_attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;

    if sig.asyncness.is_none() {
        return syn::Error::new_spanned(sig.fn_token, "`#[cached_async]` requires an `async fn`")
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
        quote! { ::callcache_core::Async },
    );

    // The body is bound to the declared return type so that `?` and
    // `return` inside it resolve against that type.
    let compute = quote! {
        move || async move {
            let __result: #ret_type = #block;
            __result
        }
    };
    let lookup = if output.is_result {
        quote! { __CALLCACHE_POOL.get_or_try_compute_async(__key, #compute).await }
    } else {
        quote! { __CALLCACHE_POOL.get_or_compute_async(__key, #compute).await }
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
