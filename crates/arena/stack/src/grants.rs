//! Grant sets and their expansion into role statements
//!
//! A function's grants are an ordered set: granting the same thing twice is
//! a no-op. At synthesis every resource-scoped grant is expanded into the
//! concrete actions the provisioning engine attaches to the function's role.

use arena_types::{
    AccessLevel, Attribute, Grant, LogicalId, PolicyStatement, ResourceKind, ResourceRef,
    ValueExpr,
};
use serde::Serialize;

// ── Action tables ──────────────────────────────────────────────────────

const TABLE_READ: &[&str] = &[
    "dynamodb:BatchGetItem",
    "dynamodb:GetRecords",
    "dynamodb:GetShardIterator",
    "dynamodb:Query",
    "dynamodb:GetItem",
    "dynamodb:Scan",
    "dynamodb:ConditionCheckItem",
    "dynamodb:DescribeTable",
];

const TABLE_WRITE: &[&str] = &[
    "dynamodb:BatchWriteItem",
    "dynamodb:PutItem",
    "dynamodb:UpdateItem",
    "dynamodb:DeleteItem",
    "dynamodb:DescribeTable",
];

const BUCKET_READ: &[&str] = &["s3:GetObject*", "s3:GetBucket*", "s3:List*"];

const BUCKET_WRITE: &[&str] = &[
    "s3:DeleteObject*",
    "s3:PutObject",
    "s3:PutObjectLegalHold",
    "s3:Abort*",
];

const USER_POOL_READ: &[&str] = &[
    "cognito-idp:DescribeUserPool",
    "cognito-idp:AdminGetUser",
    "cognito-idp:ListUsers",
];

const USER_POOL_WRITE: &[&str] = &[
    "cognito-idp:AdminCreateUser",
    "cognito-idp:AdminUpdateUserAttributes",
    "cognito-idp:AdminDeleteUser",
];

/// Actions a resource-scoped grant expands to, or `None` when the kind
/// does not accept resource grants.
pub fn grant_actions(kind: ResourceKind, level: AccessLevel) -> Option<Vec<&'static str>> {
    let (read, write) = match kind {
        ResourceKind::Table => (TABLE_READ, TABLE_WRITE),
        ResourceKind::Bucket => (BUCKET_READ, BUCKET_WRITE),
        ResourceKind::UserPool => (USER_POOL_READ, USER_POOL_WRITE),
        _ => return None,
    };

    let mut actions: Vec<&'static str> = Vec::new();
    let include_read = matches!(level, AccessLevel::Read | AccessLevel::ReadWrite);
    let include_write = matches!(level, AccessLevel::Write | AccessLevel::ReadWrite);
    let selected = read
        .iter()
        .filter(|_| include_read)
        .chain(write.iter().filter(|_| include_write));
    for action in selected {
        if !actions.contains(action) {
            actions.push(*action);
        }
    }
    Some(actions)
}

/// Resource patterns covered by a resource-scoped grant.
fn grant_resources(resource: &LogicalId, kind: ResourceKind) -> Vec<ValueExpr> {
    let arn = ValueExpr::attr(ResourceRef::named(resource), Attribute::Arn);
    match kind {
        ResourceKind::Table => vec![
            arn.clone(),
            ValueExpr::join([arn, ValueExpr::literal("/index/*")]),
        ],
        ResourceKind::Bucket => vec![arn.clone(), ValueExpr::join([arn, ValueExpr::literal("/*")])],
        _ => vec![arn],
    }
}

/// Expand one grant into a role statement.
pub fn expand_grant(
    grant: &Grant,
    kind_of: impl Fn(&LogicalId) -> Option<ResourceKind>,
) -> Option<PolicyStatement> {
    match grant {
        Grant::Resource { resource, level } => {
            let kind = kind_of(resource)?;
            let actions = grant_actions(kind, *level)?;
            Some(PolicyStatement::allow(actions, grant_resources(resource, kind)))
        }
        Grant::Statement(statement) => Some(statement.clone()),
    }
}

// ── GrantSet ───────────────────────────────────────────────────────────

/// Insertion-ordered set of grants held by one function
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GrantSet {
    grants: Vec<Grant>,
}

impl GrantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grant. Returns `false` if an identical grant was already held.
    pub fn insert(&mut self, grant: Grant) -> bool {
        if self.grants.contains(&grant) {
            return false;
        }
        self.grants.push(grant);
        true
    }

    pub fn contains(&self, grant: &Grant) -> bool {
        self.grants.contains(grant)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Grant> {
        self.grants.iter()
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Every grant expanded into a role statement, in grant order.
    pub fn role_policy(
        &self,
        kind_of: impl Fn(&LogicalId) -> Option<ResourceKind>,
    ) -> Vec<PolicyStatement> {
        self.grants
            .iter()
            .filter_map(|grant| expand_grant(grant, &kind_of))
            .collect()
    }
}

impl<'a> IntoIterator for &'a GrantSet {
    type Item = &'a Grant;
    type IntoIter = std::slice::Iter<'a, Grant>;

    fn into_iter(self) -> Self::IntoIter {
        self.grants.iter()
    }
}
