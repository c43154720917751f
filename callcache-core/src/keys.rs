use std::collections::BTreeMap;
use std::fmt::{self, Debug};

/// Types that can render themselves as part of an invocation key.
///
/// Two arguments produce the same key part exactly when they are equal for
/// caching purposes. Implement it directly to control the rendering, or mark a
/// `Debug` type with [`DefaultCacheableKey`] to use its `Debug` output.
///
/// # Examples
///
/// ```
/// use callcache_core::CacheableKey;
///
/// struct UserId(u64);
///
/// impl CacheableKey for UserId {
///     fn to_cache_key(&self) -> String {
///         format!("user:{}", self.0)
///     }
/// }
///
/// assert_eq!(UserId(7).to_cache_key(), "user:7");
/// assert_eq!((1u8, "a".to_string()).to_cache_key(), "(1, \"a\")");
/// ```
pub trait CacheableKey {
    fn to_cache_key(&self) -> String;
}

/// Marker for types whose `Debug` output is a good enough cache key.
///
/// ```
/// use callcache_core::{CacheableKey, DefaultCacheableKey};
///
/// #[derive(Debug)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl DefaultCacheableKey for Point {}
///
/// assert_eq!(Point { x: 1, y: 2 }.to_cache_key(), "Point { x: 1, y: 2 }");
/// ```
pub trait DefaultCacheableKey {}

impl<T> CacheableKey for T
where
    T: DefaultCacheableKey + Debug,
{
    fn to_cache_key(&self) -> String {
        format!("{self:?}")
    }
}

macro_rules! debug_key {
    ($($ty:ty),* $(,)?) => {
        $(
            impl DefaultCacheableKey for $ty {}
        )*
    };
}

debug_key!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    std::time::Duration,
);

impl CacheableKey for str {
    fn to_cache_key(&self) -> String {
        format!("{self:?}")
    }
}

impl<T: CacheableKey> CacheableKey for Option<T> {
    fn to_cache_key(&self) -> String {
        match self {
            Some(value) => format!("Some({})", value.to_cache_key()),
            None => "None".to_string(),
        }
    }
}

impl<T: CacheableKey> CacheableKey for [T] {
    fn to_cache_key(&self) -> String {
        let parts: Vec<String> = self.iter().map(CacheableKey::to_cache_key).collect();
        format!("[{}]", parts.join(", "))
    }
}

impl<T: CacheableKey> CacheableKey for Vec<T> {
    fn to_cache_key(&self) -> String {
        self.as_slice().to_cache_key()
    }
}

macro_rules! tuple_key {
    ($($name:ident),+) => {
        impl<$($name: CacheableKey),+> CacheableKey for ($($name,)+) {
            #[allow(non_snake_case)]
            fn to_cache_key(&self) -> String {
                let ($($name,)+) = self;
                let parts = [$($name.to_cache_key()),+];
                if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                }
            }
        }
    };
}

tuple_key!(A);
tuple_key!(A, B);
tuple_key!(A, B, C);
tuple_key!(A, B, C, D);
tuple_key!(A, B, C, D, E);
tuple_key!(A, B, C, D, E, F);
tuple_key!(A, B, C, D, E, F, G);
tuple_key!(A, B, C, D, E, F, G, H);

/// The identity of one invocation of a cached callable.
///
/// Positional arguments are kept in call order. Named arguments are kept
/// sorted by name, so their order at the call site does not matter. The key
/// never includes the value returned by the call.
///
/// # Examples
///
/// ```
/// use callcache_core::InvocationKey;
///
/// let a = InvocationKey::new().arg(&1).kwarg("b", &2).kwarg("c", &3);
/// let b = InvocationKey::new().arg(&1).kwarg("c", &3).kwarg("b", &2);
/// assert_eq!(a, b);
///
/// // Positional order matters.
/// assert_ne!(
///     InvocationKey::new().arg(&1).arg(&2),
///     InvocationKey::new().arg(&2).arg(&1)
/// );
/// assert_eq!(a.to_string(), "(1, b=2, c=3)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct InvocationKey {
    args: Vec<String>,
    kwargs: BTreeMap<String, String>,
}

impl InvocationKey {
    /// The key of a call without arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg<T: CacheableKey + ?Sized>(self, value: &T) -> Self {
        self.push_arg(value.to_cache_key())
    }

    /// Appends an already rendered positional argument.
    pub fn push_arg(mut self, rendered: String) -> Self {
        self.args.push(rendered);
        self
    }

    /// Sets a named argument, replacing a previous value with the same name.
    pub fn kwarg<T: CacheableKey + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        self.kwargs.insert(name.into(), value.to_cache_key());
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, String> {
        &self.kwargs
    }

    /// Returns `true` for the key of a call without arguments.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

impl fmt::Display for InvocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        let positional = self.args.iter().map(|arg| arg.to_string());
        let named = self.kwargs.iter().map(|(name, value)| format!("{name}={value}"));
        let parts: Vec<String> = positional.chain(named).collect();
        f.write_str(&parts.join(", "))?;
        f.write_str(")")
    }
}
