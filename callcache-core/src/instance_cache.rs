//! Memoization of the methods and properties of a type.
//!
//! A type declares its cacheable members once, in a [`TypeCacheConfig`], and
//! every instance embeds the [`InstanceCache`] it gets from the resulting
//! [`TypeCache`]. Members are resolved once, typically in the constructor,
//! into [`CachedMember`] values stored next to the cache:
//!
//! ```
//! use callcache_core::{
//!     CacheError, CachedMember, ExpirationPolicy, InstanceCache, InvocationKey, TypeCache,
//!     TypeCacheConfig,
//! };
//! use once_cell::sync::Lazy;
//!
//! static ACCOUNT_CACHE: Lazy<TypeCache> = Lazy::new(|| {
//!     TypeCacheConfig::new("Account")
//!         .members(["balance", "statement"])
//!         .exclude("statement")
//!         .policy(ExpirationPolicy::count(100))
//!         .build()
//!         .expect("valid cache configuration")
//! });
//!
//! struct Account {
//!     id: u32,
//!     cache: InstanceCache,
//!     balance: CachedMember<u64>,
//! }
//!
//! impl Account {
//!     fn new(id: u32) -> Result<Self, CacheError> {
//!         let cache = ACCOUNT_CACHE.instance();
//!         let balance = cache.member("balance")?;
//!         Ok(Self { id, cache, balance })
//!     }
//!
//!     fn balance(&self, currency: &str) -> u64 {
//!         self.balance
//!             .call(InvocationKey::new().arg(currency), || u64::from(self.id) * 100)
//!     }
//! }
//!
//! let account = Account::new(3).unwrap();
//! assert_eq!(account.balance("EUR"), 300);
//! assert_eq!(account.balance("EUR"), 300);
//! assert_eq!(account.cache.len(), 1);
//! assert!(account.cache.member::<u64>("history").is_err());
//! ```
//!
//! Instances of a non-shared type each get private pools. A shared type
//! keeps a single set of pools, created on first use and registered under
//! the type name, so that every instance sees the values computed by the
//! others and [`clear_cache`](crate::clear_cache) can empty them by type name.

use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::registry::CacheRegistry;
#[cfg(feature = "stats")]
use crate::CacheStats;
use crate::{CacheError, CachePool, ExpirationPolicy, InvocationKey};

/// Pool of one member, for one value type.
type TypedPool<V> = CachePool<InvocationKey, V>;

/// Type-erased handle on a [`TypedPool`].
trait MemberPool: Send + Sync {
    fn clear_entries(&self);
    fn entry_count(&self) -> usize;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<V: Send + Sync + 'static> MemberPool for TypedPool<V> {
    fn clear_entries(&self) {
        self.clear();
    }

    fn entry_count(&self) -> usize {
        self.len()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

fn downcast_pool<V: Send + Sync + 'static>(pool: &Arc<dyn MemberPool>) -> Option<Arc<TypedPool<V>>> {
    Arc::clone(pool).into_any().downcast().ok()
}

/// The member pools of one instance, or of every instance of a shared type.
///
/// A member gets one pool per value type it is resolved with, so a pool never
/// holds values of another type.
struct MemberPools {
    type_name: String,
    policy: ExpirationPolicy,
    pools: RwLock<HashMap<(Arc<str>, TypeId), Arc<dyn MemberPool>>>,
    #[cfg(feature = "stats")]
    stats: Arc<CacheStats>,
}

impl MemberPools {
    fn new(type_name: &str, policy: ExpirationPolicy) -> Self {
        Self {
            type_name: type_name.to_string(),
            policy,
            pools: RwLock::new(HashMap::new()),
            #[cfg(feature = "stats")]
            stats: Arc::new(CacheStats::new()),
        }
    }

    fn typed<V>(&self, member: &Arc<str>) -> Arc<TypedPool<V>>
    where
        V: Send + Sync + 'static,
    {
        let slot = (Arc::clone(member), TypeId::of::<V>());
        if let Some(pool) = self.pools.read().get(&slot).and_then(downcast_pool::<V>) {
            return pool;
        }

        let mut pools = self.pools.write();
        if let Some(pool) = pools.get(&slot).and_then(downcast_pool::<V>) {
            return pool;
        }
        let name = format!("{}::{}", self.type_name, member);
        #[cfg(feature = "stats")]
        let pool = Arc::new(TypedPool::with_stats(name, self.policy, Arc::clone(&self.stats)));
        #[cfg(not(feature = "stats"))]
        let pool = Arc::new(TypedPool::named(name, self.policy));
        pools.insert(slot, Arc::clone(&pool) as Arc<dyn MemberPool>);
        pool
    }

    /// Empties every member pool. The pools themselves are kept, so members
    /// resolved earlier keep working.
    fn clear(&self) {
        for pool in self.pools.read().values() {
            pool.clear_entries();
        }
    }

    fn len(&self) -> usize {
        self.pools.read().values().map(|pool| pool.entry_count()).sum()
    }
}

/// Builder of a [`TypeCache`].
#[derive(Debug, Clone)]
pub struct TypeCacheConfig {
    type_name: String,
    members: Vec<String>,
    excluded: Vec<String>,
    shared: bool,
    policy: ExpirationPolicy,
}

impl TypeCacheConfig {
    /// Starts the configuration of the type `type_name`, with no members, a
    /// per-instance pool and the `Forever` policy.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: Vec::new(),
            excluded: Vec::new(),
            shared: false,
            policy: ExpirationPolicy::Forever,
        }
    }

    /// Declares a cacheable method or property.
    pub fn member(mut self, name: impl Into<String>) -> Self {
        self.members.push(name.into());
        self
    }

    pub fn members<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.extend(names.into_iter().map(Into::into));
        self
    }

    /// Opts a declared member out of caching: its calls always run.
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded.push(name.into());
        self
    }

    /// Shares a single set of pools between all instances of the type.
    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    pub fn policy(mut self, policy: ExpirationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnknownMember`] if an excluded name was never
    /// declared as a member.
    pub fn build(self) -> Result<TypeCache, CacheError> {
        let members: BTreeSet<Arc<str>> = self.members.iter().map(|m| Arc::from(m.as_str())).collect();

        let mut excluded = BTreeSet::new();
        for name in &self.excluded {
            match members.get(name.as_str()) {
                Some(member) => {
                    excluded.insert(Arc::clone(member));
                }
                None => {
                    return Err(CacheError::UnknownMember {
                        type_name: self.type_name,
                        member: name.clone(),
                    })
                }
            }
        }

        tracing::debug!(
            type_name = %self.type_name,
            members = members.len(),
            excluded = excluded.len(),
            shared = self.shared,
            policy = %self.policy,
            "type cache configured"
        );

        Ok(TypeCache {
            inner: Arc::new(TypeCacheInner {
                type_name: self.type_name,
                members,
                excluded,
                policy: self.policy,
                shared: self.shared.then(OnceCell::new),
            }),
        })
    }
}

struct TypeCacheInner {
    type_name: String,
    members: BTreeSet<Arc<str>>,
    excluded: BTreeSet<Arc<str>>,
    policy: ExpirationPolicy,
    /// `Some` for shared types; the pools are created on first use.
    shared: Option<OnceCell<Arc<MemberPools>>>,
}

/// The validated cache configuration of a type. Cheap to clone.
#[derive(Clone)]
pub struct TypeCache {
    inner: Arc<TypeCacheInner>,
}

impl TypeCache {
    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    pub fn policy(&self) -> ExpirationPolicy {
        self.inner.policy
    }

    pub fn is_shared(&self) -> bool {
        self.inner.shared.is_some()
    }

    /// Returns `true` if `name` was declared, excluded or not.
    pub fn is_member(&self, name: &str) -> bool {
        self.inner.members.contains(name)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.inner.excluded.contains(name)
    }

    /// Returns the cache to embed in a new instance of the type.
    pub fn instance(&self) -> InstanceCache {
        let pools = match &self.inner.shared {
            Some(shared) => Arc::clone(shared.get_or_init(|| self.register_shared_pools())),
            None => Arc::new(MemberPools::new(self.type_name(), self.policy())),
        };
        InstanceCache {
            type_cache: self.clone(),
            pools,
        }
    }

    fn register_shared_pools(&self) -> Arc<MemberPools> {
        let pools = Arc::new(MemberPools::new(self.type_name(), self.policy()));
        #[cfg(feature = "stats")]
        crate::stats_registry::register(self.type_name(), Arc::clone(&pools.stats));
        let weak = Arc::downgrade(&pools);
        CacheRegistry::global().register_callback(self.type_name(), move || {
            if let Some(pools) = weak.upgrade() {
                pools.clear();
            }
        });
        pools
    }
}

impl fmt::Debug for TypeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCache")
            .field("type_name", &self.inner.type_name)
            .field("members", &self.inner.members)
            .field("excluded", &self.inner.excluded)
            .field("shared", &self.is_shared())
            .field("policy", &self.inner.policy)
            .finish()
    }
}

/// The cache of one instance, or the handle on the shared pools of its type.
pub struct InstanceCache {
    type_cache: TypeCache,
    pools: Arc<MemberPools>,
}

impl InstanceCache {
    pub fn type_cache(&self) -> &TypeCache {
        &self.type_cache
    }

    /// Resolves a declared member whose calls return `V`.
    ///
    /// The returned [`CachedMember`] owns its pool and can be stored in the
    /// instance, so the name lookup happens once.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnknownMember`] if `name` was not declared in the
    /// type's [`TypeCacheConfig`].
    pub fn member<V>(&self, name: &str) -> Result<CachedMember<V>, CacheError>
    where
        V: Clone + Send + Sync + 'static,
    {
        let inner = &self.type_cache.inner;
        let member = inner
            .members
            .get(name)
            .ok_or_else(|| CacheError::UnknownMember {
                type_name: inner.type_name.clone(),
                member: name.to_string(),
            })?;
        let pool = (!inner.excluded.contains(name)).then(|| self.pools.typed::<V>(member));
        Ok(CachedMember {
            member: Arc::clone(member),
            pool,
        })
    }

    /// Number of memoized member invocations, across all members.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the pools. For a shared type this clears every instance.
    pub fn clear(&self) {
        self.pools.clear();
        tracing::debug!(type_name = %self.type_cache.type_name(), "instance cache cleared");
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.pools.stats
    }
}

impl fmt::Debug for InstanceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceCache")
            .field("type_name", &self.type_cache.type_name())
            .field("shared", &self.type_cache.is_shared())
            .field("entries", &self.len())
            .finish()
    }
}

/// A member resolved by [`InstanceCache::member`].
///
/// Excluded members have no pool and run their computation on every call.
pub struct CachedMember<V> {
    member: Arc<str>,
    pool: Option<Arc<TypedPool<V>>>,
}

impl<V> CachedMember<V> {
    pub fn name(&self) -> &str {
        &self.member
    }

    pub fn is_excluded(&self) -> bool {
        self.pool.is_none()
    }
}

impl<V: Clone> CachedMember<V> {
    /// Returns the memoized result of the member call identified by `key`,
    /// running `compute` if it is missing or stale.
    pub fn call<F>(&self, key: InvocationKey, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        match &self.pool {
            Some(pool) => pool.get_or_compute(key, compute),
            None => compute(),
        }
    }

    /// Fallible version of [`call`](Self::call); errors are never memoized.
    pub fn try_call<E, F>(&self, key: InvocationKey, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        match &self.pool {
            Some(pool) => pool.get_or_try_compute(key, compute),
            None => compute(),
        }
    }

    /// Memoized property access: a member call without arguments.
    pub fn get<F>(&self, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.call(InvocationKey::new(), compute)
    }
}

impl<V> Clone for CachedMember<V> {
    fn clone(&self) -> Self {
        Self {
            member: Arc::clone(&self.member),
            pool: self.pool.clone(),
        }
    }
}

impl<V> fmt::Debug for CachedMember<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedMember")
            .field("member", &self.member)
            .field("excluded", &self.is_excluded())
            .finish()
    }
}
