//! Authorization decision table.
//!
//! An ordered list of named rules; the first rule whose predicate holds
//! decides. When none match the request continues.
//!
//! | Order | Rule | Outcome |
//! |---|---|---|
//! | 1 | `admin-session` | login redirect |
//! | 2 | `admin-role` | dashboard redirect |
//! | 3 | `kyc-session` | login redirect |
//! | 4 | `kyc-verified` | KYC onboarding redirect |
//! | 5 | `protected-session` | login redirect |
//! | 6 | `auth-page-session` | back to `from`, else dashboard |
//!
//! API requests get a JSON 401/403 instead of a redirect when
//! `authorization.api_json_errors` is set.

use http::StatusCode;
use tollgate_config::AuthorizationConfig;
use tollgate_core::{CategorySet, Decision, Identity, RequestContext, RouteCategory};

use crate::pipeline::{BoxFuture, Phase, Stage};
use crate::types::Request;

/// What a matching rule denies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Denial {
    /// No session.
    SessionRequired,
    /// Session without the `ADMIN` role.
    AdminRequired,
    /// Session without verified KYC.
    KycRequired,
    /// Session on a login/registration page.
    AlreadyAuthenticated,
}

impl Denial {
    /// Label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionRequired => "session_required",
            Self::AdminRequired => "admin_required",
            Self::KycRequired => "kyc_required",
            Self::AlreadyAuthenticated => "already_authenticated",
        }
    }
}

type Predicate = fn(CategorySet, Option<&Identity>) -> bool;

/// One row of the decision table.
#[derive(Clone, Copy)]
pub struct AuthzRule {
    name: &'static str,
    applies: Predicate,
    denial: Denial,
}

impl AuthzRule {
    /// Creates a rule.
    pub const fn new(name: &'static str, applies: Predicate, denial: Denial) -> Self {
        Self {
            name,
            applies,
            denial,
        }
    }

    /// Rule name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// What the rule denies when it matches.
    #[must_use]
    pub const fn denial(&self) -> Denial {
        self.denial
    }

    /// Evaluates the predicate.
    #[must_use]
    pub fn matches(&self, categories: CategorySet, identity: Option<&Identity>) -> bool {
        (self.applies)(categories, identity)
    }

    /// The default table, in evaluation order.
    #[must_use]
    pub fn default_table() -> Vec<Self> {
        use RouteCategory::{Admin, AuthPage, KycRequired, Protected};

        vec![
            Self::new(
                "admin-session",
                |c, id| c.contains(Admin) && id.is_none(),
                Denial::SessionRequired,
            ),
            Self::new(
                "admin-role",
                |c, id| c.contains(Admin) && id.is_some_and(|i| !i.is_admin()),
                Denial::AdminRequired,
            ),
            Self::new(
                "kyc-session",
                |c, id| c.contains(KycRequired) && id.is_none(),
                Denial::SessionRequired,
            ),
            Self::new(
                "kyc-verified",
                |c, id| c.contains(KycRequired) && id.is_some_and(|i| !i.is_kyc_verified()),
                Denial::KycRequired,
            ),
            Self::new(
                "protected-session",
                |c, id| c.contains(Protected) && id.is_none(),
                Denial::SessionRequired,
            ),
            Self::new(
                "auth-page-session",
                |c, id| c.contains(AuthPage) && id.is_some(),
                Denial::AlreadyAuthenticated,
            ),
        ]
    }
}

impl std::fmt::Debug for AuthzRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthzRule")
            .field("name", &self.name)
            .field("denial", &self.denial)
            .finish_non_exhaustive()
    }
}

/// Where denied page requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTargets {
    login: String,
    dashboard: String,
    kyc: String,
}

impl RedirectTargets {
    /// Builds the targets from the `authorization` section.
    #[must_use]
    pub fn from_config(config: &AuthorizationConfig) -> Self {
        Self {
            login: config.login_path.clone(),
            dashboard: config.dashboard_path.clone(),
            kyc: config.kyc_path.clone(),
        }
    }

    /// `{login}?from={path}&error=SessionRequired`
    #[must_use]
    pub fn login(&self, from: &str) -> String {
        format!("{}?from={}&error=SessionRequired", self.login, encode_path(from))
    }

    /// `{kyc}?from={path}&reason=KYCRequired`
    #[must_use]
    pub fn kyc(&self, from: &str) -> String {
        format!("{}?from={}&reason=KYCRequired", self.kyc, encode_path(from))
    }

    /// The dashboard.
    #[must_use]
    pub fn dashboard(&self) -> &str {
        &self.dashboard
    }

    /// The local `from` target in `query`, else the dashboard.
    #[must_use]
    pub fn return_to(&self, query: Option<&str>) -> String {
        query
            .and_then(from_param)
            .filter(|target| is_local_path(target))
            .unwrap_or_else(|| self.dashboard.clone())
    }
}

impl Default for RedirectTargets {
    fn default() -> Self {
        Self::from_config(&AuthorizationConfig::default())
    }
}

/// Authorization stage.
#[derive(Debug, Clone)]
pub struct AuthorizationStage {
    rules: Vec<AuthzRule>,
    targets: RedirectTargets,
    api_json_errors: bool,
}

impl AuthorizationStage {
    /// Creates the stage with the default rule table.
    #[must_use]
    pub fn from_config(config: &AuthorizationConfig) -> Self {
        Self::with_rules(
            AuthzRule::default_table(),
            RedirectTargets::from_config(config),
            config.api_json_errors,
        )
    }

    /// Creates the stage with a custom rule table.
    #[must_use]
    pub fn with_rules(rules: Vec<AuthzRule>, targets: RedirectTargets, api_json_errors: bool) -> Self {
        Self {
            rules,
            targets,
            api_json_errors,
        }
    }

    /// Returns the first matching rule, if any.
    #[must_use]
    pub fn first_match(
        &self,
        categories: CategorySet,
        identity: Option<&Identity>,
    ) -> Option<&AuthzRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(categories, identity))
    }

    /// Evaluates the table. Pure: the same inputs always give the same
    /// decision.
    #[must_use]
    pub fn authorize(
        &self,
        categories: CategorySet,
        identity: Option<&Identity>,
        path: &str,
        query: Option<&str>,
    ) -> Decision {
        let Some(rule) = self.first_match(categories, identity) else {
            return Decision::Continue;
        };

        if self.api_json_errors && categories.is_api() {
            if let Some(decision) = api_rejection(rule.denial) {
                return decision;
            }
        }

        match rule.denial {
            Denial::SessionRequired => Decision::redirect(self.targets.login(path)),
            Denial::AdminRequired => Decision::redirect(self.targets.dashboard()),
            Denial::KycRequired => Decision::redirect(self.targets.kyc(path)),
            Denial::AlreadyAuthenticated => Decision::redirect(self.targets.return_to(query)),
        }
    }
}

impl Default for AuthorizationStage {
    fn default() -> Self {
        Self::from_config(&AuthorizationConfig::default())
    }
}

impl Stage for AuthorizationStage {
    fn phase(&self) -> Phase {
        Phase::Authorization
    }

    fn run<'a>(&'a self, ctx: RequestContext, _request: &'a Request) -> BoxFuture<'a, RequestContext> {
        Box::pin(async move {
            let decision = self.authorize(ctx.categories(), ctx.identity(), ctx.path(), ctx.query());
            if decision.is_terminal() {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    method = %ctx.method(),
                    path = ctx.path(),
                    decision = decision.kind().as_str(),
                    location = decision.location(),
                    "authorization denied"
                );
            }
            ctx.with_decision(decision)
        })
    }
}

fn api_rejection(denial: Denial) -> Option<Decision> {
    let (status, error, code) = match denial {
        Denial::SessionRequired => (
            StatusCode::UNAUTHORIZED,
            "Authentication required",
            "SESSION_REQUIRED",
        ),
        Denial::AdminRequired => (StatusCode::FORBIDDEN, "Admin access required", "FORBIDDEN"),
        Denial::KycRequired => (
            StatusCode::FORBIDDEN,
            "KYC verification required",
            "KYC_REQUIRED",
        ),
        Denial::AlreadyAuthenticated => return None,
    };
    Some(Decision::reject(
        status,
        serde_json::json!({ "error": error, "code": code }),
    ))
}

/// Percent-encodes a path for use as a query value, keeping `/`.
fn encode_path(path: &str) -> String {
    urlencoding::encode(path).replace("%2F", "/")
}

fn from_param(query: &str) -> Option<String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .ok()?
        .into_iter()
        .find_map(|(key, value)| (key == "from").then_some(value))
}

/// Returns true if `target` is a same-origin path.
fn is_local_path(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && target.bytes().all(|b| b.is_ascii_graphic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tollgate_core::{KycStatus, Role, RouteTable};

    fn user(role: Role, kyc: KycStatus) -> Identity {
        Identity::new("u-1", role, kyc, u64::MAX)
    }

    fn decide(path: &str, identity: Option<&Identity>, query: Option<&str>) -> Decision {
        let categories = RouteTable::default().classify(path);
        AuthorizationStage::default().authorize(categories, identity, path, query)
    }

    #[test]
    fn test_admin_without_session_goes_to_login() {
        assert_eq!(
            decide("/admin/settings", None, None).location(),
            Some("/login?from=/admin/settings&error=SessionRequired")
        );
    }

    #[test]
    fn test_admin_with_user_role_goes_to_dashboard() {
        let id = user(Role::User, KycStatus::Verified);
        assert_eq!(
            decide("/admin/settings", Some(&id), None).location(),
            Some("/dashboard")
        );
        let admin = user(Role::Admin, KycStatus::Pending);
        assert_eq!(decide("/admin/settings", Some(&admin), None), Decision::Continue);
    }

    #[test]
    fn test_kyc_pending_goes_to_onboarding() {
        let id = user(Role::User, KycStatus::Pending);
        assert_eq!(
            decide("/properties/invest", Some(&id), None).location(),
            Some("/onboarding/kyc?from=/properties/invest&reason=KYCRequired")
        );
        assert_eq!(
            decide("/wallet/withdraw", None, None).location(),
            Some("/login?from=/wallet/withdraw&error=SessionRequired")
        );
    }

    #[test]
    fn test_protected_and_public_pages() {
        assert!(decide("/portfolio", None, None).location().unwrap().starts_with("/login?"));
        let id = user(Role::User, KycStatus::NotVerified);
        assert_eq!(decide("/portfolio", Some(&id), None), Decision::Continue);
        assert_eq!(decide("/about", None, None), Decision::Continue);
        assert_eq!(decide("/nowhere", None, None), Decision::Continue);
    }

    #[test]
    fn test_auth_page_returns_to_from() {
        let id = user(Role::User, KycStatus::Verified);
        assert_eq!(
            decide("/login", Some(&id), Some("from=%2Fportfolio")).location(),
            Some("/portfolio")
        );
        assert_eq!(
            decide("/login", Some(&id), Some("from=/portfolio")).location(),
            Some("/portfolio")
        );
        assert_eq!(decide("/login", Some(&id), None).location(), Some("/dashboard"));
        assert_eq!(decide("/login", None, Some("from=/portfolio")), Decision::Continue);
    }

    #[test]
    fn test_open_redirect_guard() {
        let id = user(Role::User, KycStatus::Verified);
        for query in [
            "from=https://evil.example",
            "from=//evil.example",
            "from=/\\evil.example",
            "from=javascript:alert(1)",
            "from=/a%0Ab",
        ] {
            assert_eq!(
                decide("/register", Some(&id), Some(query)).location(),
                Some("/dashboard"),
                "{query}"
            );
        }
    }

    #[test]
    fn test_from_is_percent_encoded() {
        let targets = RedirectTargets::default();
        assert_eq!(
            targets.login("/settings/a b&c"),
            "/login?from=/settings/a%20b%26c&error=SessionRequired"
        );
    }

    #[test]
    fn test_api_requests_get_json_errors() {
        let rules = vec![AuthzRule::new(
            "api-session",
            |c, id| c.contains(RouteCategory::Api) && id.is_none(),
            Denial::SessionRequired,
        )];
        let stage = AuthorizationStage::with_rules(rules, RedirectTargets::default(), true);
        let categories = CategorySet::empty().with(RouteCategory::Api);

        match stage.authorize(categories, None, "/api/me", None) {
            Decision::Reject { status, body } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body["code"], "SESSION_REQUIRED");
            }
            other => panic!("expected 401, got {other:?}"),
        }

        let redirecting =
            AuthorizationStage::with_rules(AuthzRule::default_table(), RedirectTargets::default(), false);
        let categories = categories.with(RouteCategory::Admin);
        assert!(redirecting
            .authorize(categories, None, "/api/admin", None)
            .location()
            .is_some());
    }

    #[test]
    fn test_admin_rule_wins_over_kyc() {
        let categories = CategorySet::empty()
            .with(RouteCategory::Admin)
            .with(RouteCategory::KycRequired);
        let id = user(Role::User, KycStatus::Pending);
        let stage = AuthorizationStage::default();
        assert_eq!(stage.first_match(categories, Some(&id)).unwrap().name(), "admin-role");
    }

    #[test]
    fn test_custom_targets() {
        let config = AuthorizationConfig {
            login_path: "/signin".to_string(),
            ..AuthorizationConfig::default()
        };
        let stage = AuthorizationStage::from_config(&config);
        let categories = CategorySet::empty().with(RouteCategory::Protected);
        assert_eq!(
            stage.authorize(categories, None, "/wallet", None).location(),
            Some("/signin?from=/wallet&error=SessionRequired")
        );
    }

    fn categories() -> impl Strategy<Value = CategorySet> {
        proptest::collection::vec(0..RouteCategory::ALL.len(), 0..6)
            .prop_map(|idx| idx.into_iter().map(|i| RouteCategory::ALL[i]).collect())
    }

    fn identity() -> impl Strategy<Value = Option<Identity>> {
        proptest::option::of((any::<bool>(), 0..4usize).prop_map(|(admin, kyc)| {
            let kyc = [
                KycStatus::NotVerified,
                KycStatus::Pending,
                KycStatus::Verified,
                KycStatus::Rejected,
            ][kyc];
            let role = if admin { Role::Admin } else { Role::User };
            user(role, kyc)
        }))
    }

    proptest! {
        #[test]
        fn prop_authorize_is_deterministic(set in categories(), id in identity()) {
            let stage = AuthorizationStage::default();
            let first = stage.authorize(set, id.as_ref(), "/x", Some("from=/y"));
            let second = stage.authorize(set, id.as_ref(), "/x", Some("from=/y"));
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_gated_categories_need_a_session(set in categories()) {
            let gated = [RouteCategory::Admin, RouteCategory::KycRequired, RouteCategory::Protected]
                .into_iter()
                .any(|c| set.contains(c));
            let decision = AuthorizationStage::default().authorize(set, None, "/x", None);
            if gated && !set.is_api() {
                prop_assert_eq!(decision.location(), Some("/login?from=/x&error=SessionRequired"));
            } else if !gated {
                prop_assert_eq!(decision, Decision::Continue);
            }
        }

        #[test]
        fn prop_redirects_stay_local(query in ".*", set in categories(), id in identity()) {
            let decision = AuthorizationStage::default().authorize(set, id.as_ref(), "/x", Some(&query));
            if let Some(location) = decision.location() {
                prop_assert!(is_local_path(location));
            }
        }
    }
}
