use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 资源名称
pub mod resources {
    /// 匹配任意资源
    pub const ANY: &str = "*";
    pub const AUDIT: &str = "audit";
    pub const SECURITY: &str = "security";
    pub const SYSTEM: &str = "system";
    pub const USERS: &str = "users";
    pub const CONTENT: &str = "content";
    pub const MEDIA: &str = "media";
}

/// 角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Editor,
    Author,
    Viewer,
}

/// 操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Publish,
    /// 覆盖所有操作
    Manage,
}

/// 作用范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// 仅限本人的数据
    Own,
    /// 全部数据
    All,
}

/// 权限描述 {resource, action, scope}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Permission {
    pub resource: &'static str,
    pub action: Action,
    pub scope: Scope,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

const SUPER_ADMIN_GRANTS: &[Permission] = &[Permission::new(resources::ANY, Action::Manage, Scope::All)];

const ADMIN_GRANTS: &[Permission] = &[
    Permission::new(resources::AUDIT, Action::Read, Scope::All),
    Permission::new(resources::SECURITY, Action::Read, Scope::All),
    Permission::new(resources::SECURITY, Action::Create, Scope::All),
    Permission::new(resources::SYSTEM, Action::Read, Scope::All),
    Permission::new(resources::USERS, Action::Manage, Scope::All),
    Permission::new(resources::CONTENT, Action::Manage, Scope::All),
    Permission::new(resources::MEDIA, Action::Manage, Scope::All),
];

const EDITOR_GRANTS: &[Permission] = &[
    Permission::new(resources::CONTENT, Action::Manage, Scope::All),
    Permission::new(resources::MEDIA, Action::Manage, Scope::All),
    Permission::new(resources::AUDIT, Action::Read, Scope::Own),
];

const AUTHOR_GRANTS: &[Permission] = &[
    Permission::new(resources::CONTENT, Action::Read, Scope::All),
    Permission::new(resources::CONTENT, Action::Create, Scope::Own),
    Permission::new(resources::CONTENT, Action::Update, Scope::Own),
    Permission::new(resources::MEDIA, Action::Create, Scope::Own),
    Permission::new(resources::AUDIT, Action::Read, Scope::Own),
];

const VIEWER_GRANTS: &[Permission] = &[
    Permission::new(resources::CONTENT, Action::Read, Scope::All),
    Permission::new(resources::AUDIT, Action::Read, Scope::Own),
];

impl Role {
    pub const ALL: [Role; 5] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Editor,
        Role::Author,
        Role::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Author => "author",
            Role::Viewer => "viewer",
        }
    }

    /// 角色拥有的权限
    pub fn grants(&self) -> &'static [Permission] {
        match self {
            Role::SuperAdmin => SUPER_ADMIN_GRANTS,
            Role::Admin => ADMIN_GRANTS,
            Role::Editor => EDITOR_GRANTS,
            Role::Author => AUTHOR_GRANTS,
            Role::Viewer => VIEWER_GRANTS,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Publish => "publish",
            Action::Manage => "manage",
        }
    }
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Own => "own",
            Scope::All => "all",
        }
    }
}

impl Permission {
    pub const fn new(resource: &'static str, action: Action, scope: Scope) -> Self {
        Self {
            resource,
            action,
            scope,
        }
    }

    /// 作为授权项时，是否满足 `required`
    pub fn covers(&self, required: &Permission) -> bool {
        let resource_ok = self.resource == resources::ANY || self.resource == required.resource;
        let action_ok = self.action == Action::Manage || self.action == required.action;
        let scope_ok = self.scope == Scope::All || required.scope == Scope::Own;

        resource_ok && action_ok && scope_ok
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.resource,
            self.action.as_str(),
            self.scope.as_str()
        )
    }
}

/// 角色是否拥有指定权限
pub fn has_permission(role: Role, required: &Permission) -> bool {
    role.grants().iter().any(|grant| grant.covers(required))
}

/// 检查角色是否拥有全部所需权限，返回第一个缺失的权限
pub fn check_permissions(role: Role, required: &[Permission]) -> Result<(), Permission> {
    match required.iter().find(|p| !has_permission(role, p)) {
        Some(missing) => Err(*missing),
        None => Ok(()),
    }
}
