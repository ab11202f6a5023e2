//! Resource access control lists and the parent-chain resolver.
//!
//! # Purpose
//! Decide whether a principal holding a set of roles may perform an action on
//! a resource. A resource may carry an ACL (ordered [`Ace`]s), a parent
//! reference to the resource that owns it, both, or neither. Permissions are
//! inherited by walking from a resource to its parents until an ACE matches.
//!
//! # Key invariants
//! - [`GLOBAL_ADMIN`](crate::GLOBAL_ADMIN) allows everything, before any
//!   resource is inspected.
//! - The first ACE granting (role, action) wins; there is no explicit deny.
//! - A resource with neither an ACL match nor a parent is a denial
//!   (`Ok(false)`), never an error.
//! - Lookup failures, cancellation, timeouts and over-long chains are errors
//!   ([`AccessError`]) and are never reported as denial.
//! - Parent fetches are strictly sequential and at most `max_parent_hops`.
//!
//! # Examples
//! ```rust
//! use massok_authz::{Ace, PrincipalId, Roles, USER_SELF, acl_grants};
//!
//! let acl = vec![Ace::new(["users.user.u-1"], ["user.read"])];
//! let roles = Roles::from([USER_SELF]);
//! assert!(acl_grants(&acl, "user.read", &PrincipalId::new("u-1"), &roles));
//! assert!(!acl_grants(&acl, "user.delete", &PrincipalId::new("u-1"), &roles));
//! ```
use crate::{AccessError, PrincipalId, RepositoryError, Roles, resolve_self};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_PARENT_HOPS: usize = 16;

/// Access control entry: any of `roles` may perform any of `actions`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ace {
    pub roles: Roles,
    pub actions: HashSet<String>,
}

impl Ace {
    pub fn new<R, A>(roles: R, actions: A) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, role: &str, action: &str) -> bool {
        self.roles.has_role(role) && self.actions.contains(action)
    }
}

pub type Acl = Vec<Ace>;

/// Reference to the resource that owns another resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParentRef {
    pub resource_type: String,
    pub resource_id: String,
}

impl ParentRef {
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }
}

impl std::fmt::Display for ParentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource_id)
    }
}

/// Capability: the resource carries its own ACL.
pub trait HasAcl {
    fn acl(&self) -> Acl;
}

/// Capability: the resource inherits permissions from a parent.
pub trait HasParent {
    fn parent(&self) -> ParentRef;
}

/// A resource the resolver can inspect.
///
/// Capabilities are opt-in; the defaults expose neither, which resolves to
/// denial.
pub trait Resource: Send + Sync + std::fmt::Debug {
    fn resource_type(&self) -> &str;
    fn resource_id(&self) -> &str;

    fn as_acl(&self) -> Option<&dyn HasAcl> {
        None
    }

    fn as_parent(&self) -> Option<&dyn HasParent> {
        None
    }
}

/// Type-erased resource lookup used to walk parent chains.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn get(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<Arc<dyn Resource>, RepositoryError>;
}

/// Whether any ACE grants `action` to one of `roles`.
///
/// ACEs are tried in order and roles in the order supplied; the self
/// template is resolved against `principal_id` before comparison.
pub fn acl_grants(acl: &[Ace], action: &str, principal_id: &PrincipalId, roles: &Roles) -> bool {
    acl.iter().any(|ace| {
        roles
            .iter()
            .any(|role| ace.allows(&resolve_self(role, principal_id), action))
    })
}

#[derive(Clone)]
pub struct AccessResolver {
    repository: Arc<dyn ResourceRepository>,
    max_parent_hops: usize,
    hop_timeout: Option<Duration>,
}

impl AccessResolver {
    pub fn new(repository: Arc<dyn ResourceRepository>) -> Self {
        Self {
            repository,
            max_parent_hops: DEFAULT_MAX_PARENT_HOPS,
            hop_timeout: None,
        }
    }

    pub fn with_max_parent_hops(mut self, max_parent_hops: usize) -> Self {
        self.max_parent_hops = max_parent_hops;
        self
    }

    /// Bound every repository lookup; an elapsed lookup is [`AccessError::Timeout`].
    pub fn with_hop_timeout(mut self, hop_timeout: Duration) -> Self {
        self.hop_timeout = Some(hop_timeout);
        self
    }

    /// Decide whether `principal_id` holding `roles` may perform `action` on
    /// `resource`. `None` is the root resource: no ACL and no parent.
    ///
    /// # Returns
    /// - `Ok(true)` on the first matching ACE or for the universal admin.
    /// - `Ok(false)` when the chain ends without a match.
    ///
    /// # Errors
    /// - [`AccessError::NotFound`] / [`AccessError::Repository`] when a parent
    ///   lookup fails.
    /// - [`AccessError::ChainTooDeep`] after `max_parent_hops` fetches.
    /// - [`AccessError::Cancelled`] / [`AccessError::Timeout`].
    pub async fn access_allowed(
        &self,
        cancel: &CancellationToken,
        resource: Option<Arc<dyn Resource>>,
        action: &str,
        principal_id: &PrincipalId,
        roles: &Roles,
    ) -> Result<bool, AccessError> {
        if roles.is_global_admin() {
            tracing::debug!(principal = %principal_id, action, "global admin allowed");
            return Ok(true);
        }
        if cancel.is_cancelled() {
            return Err(AccessError::Cancelled);
        }
        let Some(mut current) = resource else {
            tracing::debug!(principal = %principal_id, action, "root resource denied");
            return Ok(false);
        };

        let mut hops = 0usize;
        loop {
            if let Some(holder) = current.as_acl()
                && acl_grants(&holder.acl(), action, principal_id, roles)
            {
                tracing::debug!(
                    principal = %principal_id,
                    action,
                    resource_type = current.resource_type(),
                    resource_id = current.resource_id(),
                    hops,
                    "access allowed"
                );
                return Ok(true);
            }

            let Some(parent) = current.as_parent().map(|holder| holder.parent()) else {
                tracing::debug!(
                    principal = %principal_id,
                    action,
                    resource_type = current.resource_type(),
                    resource_id = current.resource_id(),
                    hops,
                    "no matching ace"
                );
                return Ok(false);
            };

            if hops >= self.max_parent_hops {
                tracing::warn!(
                    max_parent_hops = self.max_parent_hops,
                    parent = %parent,
                    "resource chain too deep"
                );
                return Err(AccessError::ChainTooDeep(self.max_parent_hops));
            }
            hops += 1;
            tracing::debug!(parent = %parent, hop = hops, "walking to parent");
            current = self.fetch(cancel, &parent).await?;
        }
    }

    /// Load a resource through the repository with the resolver's
    /// cancellation and timeout rules.
    pub async fn load(
        &self,
        cancel: &CancellationToken,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<Arc<dyn Resource>, AccessError> {
        self.fetch(cancel, &ParentRef::new(resource_type, resource_id))
            .await
    }

    async fn fetch(
        &self,
        cancel: &CancellationToken,
        target: &ParentRef,
    ) -> Result<Arc<dyn Resource>, AccessError> {
        let lookup = async {
            let get = self
                .repository
                .get(&target.resource_type, &target.resource_id);
            match self.hop_timeout {
                Some(limit) => {
                    tokio::time::timeout(limit, get)
                        .await
                        .map_err(|_| AccessError::Timeout {
                            resource_type: target.resource_type.clone(),
                            resource_id: target.resource_id.clone(),
                        })
                }
                None => Ok(get.await),
            }
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AccessError::Cancelled),
            fetched = lookup => fetched?,
        };

        fetched.map_err(|err| match err {
            RepositoryError::NotFound {
                resource_type,
                resource_id,
            } => AccessError::NotFound {
                resource_type,
                resource_id,
            },
            RepositoryError::Unexpected(source) => {
                tracing::error!(resource = %target, error = %source, "resource lookup failed");
                AccessError::Repository {
                    resource_type: target.resource_type.clone(),
                    resource_id: target.resource_id.clone(),
                    source,
                }
            }
        })
    }
}

impl std::fmt::Debug for AccessResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessResolver")
            .field("max_parent_hops", &self.max_parent_hops)
            .field("hop_timeout", &self.hop_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GLOBAL_ADMIN, USER_SELF};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    struct Node {
        kind: &'static str,
        id: String,
        acl: Option<Acl>,
        parent: Option<ParentRef>,
    }

    impl HasAcl for Node {
        fn acl(&self) -> Acl {
            self.acl.clone().unwrap_or_default()
        }
    }

    impl HasParent for Node {
        fn parent(&self) -> ParentRef {
            self.parent
                .clone()
                .unwrap_or_else(|| ParentRef::new("", ""))
        }
    }

    impl Resource for Node {
        fn resource_type(&self) -> &str {
            self.kind
        }

        fn resource_id(&self) -> &str {
            &self.id
        }

        fn as_acl(&self) -> Option<&dyn HasAcl> {
            self.acl.as_ref().map(|_| self as &dyn HasAcl)
        }

        fn as_parent(&self) -> Option<&dyn HasParent> {
            self.parent.as_ref().map(|_| self as &dyn HasParent)
        }
    }

    fn node(id: &str, acl: Option<Acl>, parent: Option<&str>) -> Arc<dyn Resource> {
        Arc::new(Node {
            kind: "node",
            id: id.to_string(),
            acl,
            parent: parent.map(|p| ParentRef::new("node", p)),
        })
    }

    #[derive(Default)]
    struct Repo {
        nodes: HashMap<String, Arc<dyn Resource>>,
        fetches: AtomicUsize,
        fail: bool,
        stall: bool,
    }

    impl Repo {
        fn with(nodes: Vec<Arc<dyn Resource>>) -> Self {
            Self {
                nodes: nodes
                    .into_iter()
                    .map(|n| (n.resource_id().to_string(), n))
                    .collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ResourceRepository for Repo {
        async fn get(
            &self,
            resource_type: &str,
            resource_id: &str,
        ) -> Result<Arc<dyn Resource>, RepositoryError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(RepositoryError::Unexpected(anyhow::anyhow!("store offline")));
            }
            self.nodes
                .get(resource_id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound {
                    resource_type: resource_type.to_string(),
                    resource_id: resource_id.to_string(),
                })
        }
    }

    fn principal() -> PrincipalId {
        PrincipalId::new("u-1")
    }

    fn read_acl(role: &str) -> Option<Acl> {
        Some(vec![Ace::new([role], ["user.read"])])
    }

    #[tokio::test]
    async fn global_admin_short_circuits() {
        let repo = Arc::new(Repo::default());
        let resolver = AccessResolver::new(repo.clone());
        let roles = Roles::from([GLOBAL_ADMIN]);
        let cancel = CancellationToken::new();

        let leaf = node("leaf", None, Some("missing"));
        assert!(
            resolver
                .access_allowed(&cancel, Some(leaf), "anything", &principal(), &roles)
                .await
                .expect("allowed")
        );
        assert!(
            resolver
                .access_allowed(&cancel, None, "user.create", &principal(), &roles)
                .await
                .expect("allowed")
        );
        assert_eq!(repo.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn self_role_matches_owner_only_for_listed_actions() {
        let resolver = AccessResolver::new(Arc::new(Repo::default()));
        let roles = Roles::from([USER_SELF]);
        let cancel = CancellationToken::new();
        let owned = node("u-1", read_acl("users.user.u-1"), None);

        assert!(
            resolver
                .access_allowed(&cancel, Some(owned.clone()), "user.read", &principal(), &roles)
                .await
                .expect("read")
        );
        assert!(
            !resolver
                .access_allowed(&cancel, Some(owned.clone()), "user.delete", &principal(), &roles)
                .await
                .expect("delete")
        );
        assert!(
            !resolver
                .access_allowed(&cancel, Some(owned), "user.read", &PrincipalId::new("u-2"), &roles)
                .await
                .expect("other principal")
        );
    }

    #[tokio::test]
    async fn inherits_from_root_after_two_hops() {
        let root = node("root", read_acl("users.user.u-1"), None);
        let parent = node("parent", None, Some("root"));
        let child = node("child", None, Some("parent"));
        let repo = Arc::new(Repo::with(vec![root, parent]));
        let resolver = AccessResolver::new(repo.clone());

        let allowed = resolver
            .access_allowed(
                &CancellationToken::new(),
                Some(child),
                "user.read",
                &principal(),
                &Roles::from([USER_SELF]),
            )
            .await
            .expect("resolve");
        assert!(allowed);
        assert_eq!(repo.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn acl_miss_falls_through_to_parent() {
        let root = node("root", read_acl("users.user.u-1"), None);
        let child = node("child", read_acl("users.user.other"), Some("root"));
        let repo = Arc::new(Repo::with(vec![root]));
        let resolver = AccessResolver::new(repo.clone());

        let allowed = resolver
            .access_allowed(
                &CancellationToken::new(),
                Some(child),
                "user.read",
                &principal(),
                &Roles::from(["users.user.u-1"]),
            )
            .await
            .expect("resolve");
        assert!(allowed);
        assert_eq!(repo.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_acl_and_no_parent_is_denial() {
        let resolver = AccessResolver::new(Arc::new(Repo::default()));
        let cancel = CancellationToken::new();
        let roles = Roles::from(["users.user.u-1"]);

        let bare = node("bare", None, None);
        assert!(
            !resolver
                .access_allowed(&cancel, Some(bare), "user.read", &principal(), &roles)
                .await
                .expect("resolve")
        );
        assert!(
            !resolver
                .access_allowed(&cancel, None, "user.read", &principal(), &roles)
                .await
                .expect("resolve")
        );
    }

    #[tokio::test]
    async fn repository_failure_is_an_error_not_a_denial() {
        let repo = Arc::new(Repo {
            fail: true,
            ..Repo::default()
        });
        let resolver = AccessResolver::new(repo);
        let child = node("child", None, Some("parent"));

        let err = resolver
            .access_allowed(
                &CancellationToken::new(),
                Some(child),
                "user.read",
                &principal(),
                &Roles::from(["users.user.u-1"]),
            )
            .await
            .expect_err("repository error");
        assert!(matches!(
            err,
            AccessError::Repository { ref resource_id, .. } if resource_id == "parent"
        ));
    }

    #[tokio::test]
    async fn missing_parent_is_not_found() {
        let resolver = AccessResolver::new(Arc::new(Repo::default()));
        let child = node("child", None, Some("ghost"));

        let err = resolver
            .access_allowed(
                &CancellationToken::new(),
                Some(child),
                "user.read",
                &principal(),
                &Roles::new(),
            )
            .await
            .expect_err("not found");
        assert!(matches!(err, AccessError::NotFound { .. }));
    }

    #[tokio::test]
    async fn cyclic_chain_is_bounded() {
        let a = node("a", None, Some("b"));
        let b = node("b", None, Some("a"));
        let repo = Arc::new(Repo::with(vec![a.clone(), b]));
        let resolver = AccessResolver::new(repo.clone()).with_max_parent_hops(4);

        let err = resolver
            .access_allowed(
                &CancellationToken::new(),
                Some(a),
                "user.read",
                &principal(),
                &Roles::new(),
            )
            .await
            .expect_err("too deep");
        assert!(matches!(err, AccessError::ChainTooDeep(4)));
        assert_eq!(repo.fetches.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn cancellation_aborts_resolution() {
        let repo = Arc::new(Repo {
            stall: true,
            ..Repo::default()
        });
        let resolver = AccessResolver::new(repo);
        let cancel = CancellationToken::new();
        let child = node("child", None, Some("parent"));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = resolver
            .access_allowed(&cancel, Some(child), "user.read", &principal(), &Roles::new())
            .await
            .expect_err("cancelled");
        assert!(matches!(err, AccessError::Cancelled));

        let err = resolver
            .access_allowed(&cancel, None, "user.read", &principal(), &Roles::new())
            .await
            .expect_err("already cancelled");
        assert!(matches!(err, AccessError::Cancelled));
    }

    #[tokio::test]
    async fn stalled_lookup_times_out() {
        let repo = Arc::new(Repo {
            stall: true,
            ..Repo::default()
        });
        let resolver = AccessResolver::new(repo).with_hop_timeout(Duration::from_millis(20));

        let err = resolver
            .load(&CancellationToken::new(), "node", "anything")
            .await
            .expect_err("timeout");
        assert!(matches!(err, AccessError::Timeout { .. }));
    }

    #[test]
    fn first_matching_ace_wins_across_roles() {
        let acl = vec![
            Ace::new(["users.admin.u-1"], ["user.delete"]),
            Ace::new(["users.user.u-1"], ["user.read", "user.update"]),
        ];
        let roles = Roles::from(["users.user.u-9", USER_SELF]);
        assert!(acl_grants(&acl, "user.update", &principal(), &roles));
        assert!(!acl_grants(&acl, "user.delete", &principal(), &roles));
    }
}
