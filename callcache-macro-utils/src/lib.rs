//! Shared utilities for callcache procedural macros
//!
//! This crate provides the attribute parsing and code generation used by both
//! `callcache-macros` and `callcache-async-macros`. Attribute values are
//! validated here, at compile time: a malformed `ttl` or an invalid `count`
//! becomes a compile error pointing at the attribute.

use callcache_core::{parse_duration, ExpirationPolicy};
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{
    punctuated::Punctuated, Expr, ExprLit, ExprUnary, FnArg, GenericArgument, Lit, MetaNameValue,
    Pat, PathArguments, ReturnType, Signature, Token, Type, UnOp,
};

/// Parsed macro attributes
pub struct CacheAttributes {
    /// Expression building the `ExpirationPolicy` of the generated pool.
    pub policy: TokenStream2,
    pub custom_name: Option<String>,
}

impl Default for CacheAttributes {
    fn default() -> Self {
        Self {
            policy: quote! { ::callcache_core::ExpirationPolicy::Forever },
            custom_name: None,
        }
    }
}

/// The types involved in caching a function's return value.
pub struct CachedOutput {
    /// The declared return type.
    pub ret_type: TokenStream2,
    /// The type stored in the pool: the `Ok` type of a `Result`, otherwise
    /// the return type itself.
    pub value_type: TokenStream2,
    pub is_result: bool,
}

fn error(tokens: impl ToTokens, message: &str) -> TokenStream2 {
    syn::Error::new_spanned(tokens, message).to_compile_error()
}

/// Reads a possibly negated numeric literal.
fn numeric_literal(expr: &Expr) -> Option<(bool, &Lit)> {
    match expr {
        Expr::Lit(ExprLit { lit, .. }) => Some((false, lit)),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr,
            ..
        }) => match expr.as_ref() {
            Expr::Lit(ExprLit { lit, .. }) => Some((true, lit)),
            _ => None,
        },
        _ => None,
    }
}

/// Turns a policy computed at expansion time into the tokens that rebuild it.
fn policy_tokens(policy: ExpirationPolicy) -> TokenStream2 {
    match policy {
        ExpirationPolicy::Forever => quote! { ::callcache_core::ExpirationPolicy::Forever },
        ExpirationPolicy::Ttl(ttl) => {
            let secs = ttl.as_secs();
            let nanos = ttl.subsec_nanos();
            quote! {
                ::callcache_core::ExpirationPolicy::Ttl(::std::time::Duration::new(#secs, #nanos))
            }
        }
        ExpirationPolicy::Count(count) => {
            quote! { ::callcache_core::ExpirationPolicy::Count(#count) }
        }
    }
}

/// Parse the `ttl` attribute: a duration string (`"1h30m"`) or a number of
/// seconds (`90`, `0.5`). Zero or negative values disable caching.
pub fn parse_ttl_attribute(nv: &MetaNameValue) -> Result<TokenStream2, TokenStream2> {
    let invalid = || {
        error(
            &nv.value,
            "Invalid syntax for `ttl`: expected `ttl = \"1h30m\"` or `ttl = <seconds>`",
        )
    };

    let secs = match numeric_literal(&nv.value) {
        Some((false, Lit::Str(s))) => {
            parse_duration(&s.value()).map_err(|e| error(s, &e.to_string()))?
        }
        Some((negative, Lit::Int(i))) => {
            let secs = i.base10_parse::<f64>().map_err(|e| e.to_compile_error())?;
            if negative {
                -secs
            } else {
                secs
            }
        }
        Some((negative, Lit::Float(f))) => {
            let secs = f.base10_parse::<f64>().map_err(|e| e.to_compile_error())?;
            if negative {
                -secs
            } else {
                secs
            }
        }
        _ => return Err(invalid()),
    };

    let policy = ExpirationPolicy::ttl_secs(secs).map_err(|e| error(&nv.value, &e.to_string()))?;
    Ok(policy_tokens(policy))
}

/// Parse the `count` attribute: a non-negative integer.
pub fn parse_count_attribute(nv: &MetaNameValue) -> Result<TokenStream2, TokenStream2> {
    match numeric_literal(&nv.value) {
        Some((false, Lit::Int(i))) => {
            let count = i.base10_parse::<u64>().map_err(|e| e.to_compile_error())?;
            Ok(policy_tokens(ExpirationPolicy::Count(count)))
        }
        Some((true, Lit::Int(_))) => Err(error(&nv.value, "`count` must not be negative")),
        _ => Err(error(
            &nv.value,
            "Invalid syntax for `count`: expected `count = <integer>`",
        )),
    }
}

/// Parse the `name` attribute
pub fn parse_name_attribute(nv: &MetaNameValue) -> Result<String, TokenStream2> {
    match &nv.value {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s.value()),
        _ => Err(error(
            &nv.value,
            "Invalid syntax for `name`: expected `name = \"...\"`",
        )),
    }
}

/// Parse the attributes of `#[cached]` and `#[cached_async]`.
pub fn parse_attributes(attr: TokenStream2) -> Result<CacheAttributes, TokenStream2> {
    use syn::parse::Parser;

    let parser = Punctuated::<MetaNameValue, Token![,]>::parse_terminated;
    let parsed_args = parser.parse2(attr).map_err(|e| e.to_compile_error())?;

    let mut attrs = CacheAttributes::default();
    let mut policy_seen: Option<&'static str> = None;

    for nv in &parsed_args {
        let kind = if nv.path.is_ident("ttl") {
            attrs.policy = parse_ttl_attribute(nv)?;
            "ttl"
        } else if nv.path.is_ident("count") {
            attrs.policy = parse_count_attribute(nv)?;
            "count"
        } else if nv.path.is_ident("name") {
            attrs.custom_name = Some(parse_name_attribute(nv)?);
            continue;
        } else {
            return Err(error(
                &nv.path,
                "Unknown attribute: expected `ttl`, `count` or `name`",
            ));
        };

        if let Some(previous) = policy_seen.replace(kind) {
            let message = if previous == kind {
                format!("`{kind}` is given twice")
            } else {
                "`ttl` and `count` cannot be combined".to_string()
            };
            return Err(error(nv, &message));
        }
    }

    Ok(attrs)
}

/// Detects `Result<T, E>` return types (by the last path segment, so that
/// `io::Result<T>` aliases are recognized too) and extracts the cached type.
pub fn cached_output(output: &ReturnType) -> CachedOutput {
    let ty = match output {
        ReturnType::Type(_, ty) => ty.as_ref(),
        ReturnType::Default => {
            return CachedOutput {
                ret_type: quote! { () },
                value_type: quote! { () },
                is_result: false,
            }
        }
    };

    let ok_type = match ty {
        Type::Path(type_path) if type_path.qself.is_none() => type_path
            .path
            .segments
            .last()
            .filter(|segment| segment.ident == "Result")
            .and_then(|segment| match &segment.arguments {
                PathArguments::AngleBracketed(args) => args.args.first(),
                _ => None,
            })
            .and_then(|arg| match arg {
                GenericArgument::Type(ok) => Some(ok),
                _ => None,
            }),
        _ => None,
    };

    match ok_type {
        Some(ok) => CachedOutput {
            ret_type: quote! { #ty },
            value_type: quote! { #ok },
            is_result: true,
        },
        None => CachedOutput {
            ret_type: quote! { #ty },
            value_type: quote! { #ty },
            is_result: false,
        },
    }
}

/// Generate the `InvocationKey` expression for a call of `sig`.
///
/// The receiver, if any, is the first positional part, followed by every
/// argument in declaration order. Arguments must be bound to plain
/// identifiers so that the key can borrow them before the body runs.
pub fn generate_key_expr(sig: &Signature) -> Result<TokenStream2, TokenStream2> {
    let mut parts = Vec::new();
    for arg in &sig.inputs {
        match arg {
            FnArg::Receiver(_) => parts.push(quote! { self.to_cache_key() }),
            FnArg::Typed(pat_type) => match pat_type.pat.as_ref() {
                Pat::Ident(pat_ident) => {
                    let ident = &pat_ident.ident;
                    parts.push(quote! { (#ident).to_cache_key() });
                }
                other => {
                    return Err(error(
                        other,
                        "cached function arguments must be plain identifiers",
                    ))
                }
            },
        }
    }

    if parts.is_empty() {
        return Ok(quote! { ::callcache_core::InvocationKey::new() });
    }

    Ok(quote! {{
        use ::callcache_core::CacheableKey;
        ::callcache_core::InvocationKey::new()
            #( .push_arg(#parts) )*
    }})
}

/// Generate the static pool of a cached function and its registration in
/// the global registry, under `name`.
pub fn generate_pool(
    name: &str,
    policy: &TokenStream2,
    value_type: &TokenStream2,
    mode: TokenStream2,
) -> TokenStream2 {
    quote! {
        static __CALLCACHE_POOL: ::callcache_core::__private::Lazy<
            ::callcache_core::CachePool<::callcache_core::InvocationKey, #value_type, #mode>,
        > = ::callcache_core::__private::Lazy::new(|| {
            ::callcache_core::CachePool::named(#name, #policy)
        });
        static __CALLCACHE_REGISTER: ::std::sync::Once = ::std::sync::Once::new();
        __CALLCACHE_REGISTER.call_once(|| {
            ::callcache_core::registry::register_pool(&*__CALLCACHE_POOL);
        });
    }
}
