// defense-core/src/model/tenant.rs
// ============================================================================
// Module: TenantContext
// Description: The caller's tenant identity and access scope.
// Purpose: Gate every company-scoped operation through a single, fail-closed
//          access predicate.
// Dependencies: serde, crate::identifiers
// ============================================================================

//! ## Overview
//! `TenantContext` is the only source of truth for "may this caller touch
//! this company's data." It is an immutable value, constructed once per
//! request/background task and threaded through explicitly — never read
//! from a global. The default context (`TenantContext::anonymous`) denies
//! everything, so a missing or malformed context fails closed rather than
//! silently granting access. `allowed_companies` is a set rather than a
//! single id because spec.md §3 allows a caller to belong to more than one
//! company; membership is matched against ids already normalized by
//! [`CompanyId::new`] (trimmed, lower-cased), so insertion order and
//! casing at construction time do not matter.

use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::identifiers::CompanyId;
use crate::identifiers::UserId;

/// Caller identity and access scope for a single deliberation request.
///
/// # Invariants
/// - `is_admin` bypasses the `allowed_companies` check, except that an
///   admin still has to name the company they mean when calling a
///   company-scoped operation; "admin" is not "no tenant."
/// - `TenantContext::anonymous` grants access to nothing and is the safe
///   default for background tasks that have not been given a real context.
/// - `may_access` is `false` whenever `is_authenticated` is `false`,
///   regardless of `allowed_companies` or `is_admin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    /// Identifier of the calling user, if authenticated.
    pub user_id: Option<UserId>,
    /// Companies this caller may access, matched by normalized equality.
    pub allowed_companies: HashSet<CompanyId>,
    /// Whether the caller has cross-tenant administrative access.
    pub is_admin: bool,
    /// Whether the caller presented valid authentication at all. A caller
    /// that failed authentication is distinct from one that authenticated
    /// but has no company assigned, per spec.md §4.1's `NotAuthenticated`
    /// vs. `NoTenantSelected`/`TenantNotAuthorized` distinction.
    pub is_authenticated: bool,
}

/// Reasons [`TenantContext::authorize`] may refuse a company-scoped
/// operation, matching spec.md §4.1's three distinct failure conditions.
/// The core's entry points always name an explicit target company (a
/// project's `company_id`, or one supplied by the caller), so the
/// `NoTenantSelected` condition — a request that never named a company at
/// all — belongs to the HTTP wrapper that parses `X-Empresa-ID`, not to
/// this library's entry points; it is not modeled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TenantError {
    /// The caller did not present valid authentication.
    #[error("authentication required")]
    NotAuthenticated,
    /// The caller authenticated but is not authorized for the requested
    /// company.
    #[error("caller is not authorized for this company")]
    TenantNotAuthorized,
}

impl TenantContext {
    /// Builds an authenticated tenant context scoped to a single company.
    #[must_use]
    pub fn scoped(user_id: UserId, company_id: CompanyId) -> Self {
        let mut allowed_companies = HashSet::with_capacity(1);
        allowed_companies.insert(company_id);
        Self { user_id: Some(user_id), allowed_companies, is_admin: false, is_authenticated: true }
    }

    /// Builds an authenticated tenant context scoped to several companies.
    #[must_use]
    pub fn multi_scoped(user_id: UserId, allowed_companies: HashSet<CompanyId>) -> Self {
        Self { user_id: Some(user_id), allowed_companies, is_admin: false, is_authenticated: true }
    }

    /// Builds an administrative tenant context with cross-tenant access.
    #[must_use]
    pub fn admin(user_id: UserId) -> Self {
        Self { user_id: Some(user_id), allowed_companies: HashSet::new(), is_admin: true, is_authenticated: true }
    }

    /// The safe default for contexts that were never properly established:
    /// grants access to nothing.
    #[must_use]
    pub fn anonymous() -> Self {
        Self { user_id: None, allowed_companies: HashSet::new(), is_admin: false, is_authenticated: false }
    }

    /// Returns `true` when this caller may access data scoped to `company`.
    ///
    /// Unauthenticated callers are always denied. Admins may access any
    /// company. Non-admin callers may access only companies present in
    /// `allowed_companies`.
    #[must_use]
    pub fn may_access(&self, company: &CompanyId) -> bool {
        self.is_authenticated && (self.is_admin || self.allowed_companies.contains(company))
    }

    /// Authorizes access to `company`, distinguishing *why* access was
    /// denied rather than collapsing both reasons into one boolean.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::NotAuthenticated`] when the caller never
    /// authenticated, or [`TenantError::TenantNotAuthorized`] when they
    /// authenticated but `company` is outside their scope.
    pub fn authorize(&self, company: &CompanyId) -> Result<(), TenantError> {
        if !self.is_authenticated {
            return Err(TenantError::NotAuthenticated);
        }
        if self.is_admin || self.allowed_companies.contains(company) {
            Ok(())
        } else {
            Err(TenantError::TenantNotAuthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_context_denies_everything() {
        let ctx = TenantContext::anonymous();
        assert!(!ctx.may_access(&CompanyId::new("acme")));
        assert_eq!(ctx.authorize(&CompanyId::new("acme")), Err(TenantError::NotAuthenticated));
    }

    #[test]
    fn scoped_context_allows_only_its_own_company() {
        let ctx = TenantContext::scoped(UserId::new("u1"), CompanyId::new("ACME  "));
        assert!(ctx.may_access(&CompanyId::new(" acme")));
        assert!(!ctx.may_access(&CompanyId::new("other")));
        assert_eq!(ctx.authorize(&CompanyId::new("other")), Err(TenantError::TenantNotAuthorized));
    }

    #[test]
    fn multi_scoped_context_allows_any_of_its_companies() {
        let mut allowed = HashSet::new();
        allowed.insert(CompanyId::new("acme"));
        allowed.insert(CompanyId::new("globex"));
        let ctx = TenantContext::multi_scoped(UserId::new("u1"), allowed);
        assert!(ctx.may_access(&CompanyId::new("acme")));
        assert!(ctx.may_access(&CompanyId::new("globex")));
        assert!(!ctx.may_access(&CompanyId::new("other")));
    }

    #[test]
    fn admin_context_allows_any_company() {
        let ctx = TenantContext::admin(UserId::new("root"));
        assert!(ctx.may_access(&CompanyId::new("acme")));
        assert!(ctx.may_access(&CompanyId::new("other")));
        assert!(ctx.authorize(&CompanyId::new("anything")).is_ok());
    }
}
