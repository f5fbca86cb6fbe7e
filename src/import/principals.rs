// src/import/principals.rs

//! Group and user import
//!
//! Groups may name a parent that is declared later in the manifest. Such
//! groups wait in a queue that is drained in full passes; a pass that
//! creates nothing ends the retries and every remaining group is reported.

use super::common::parse_int;
use super::context::ImportContext;
use crate::error::{Error, Result};
use crate::manifest::{GroupEntry, Manifest, UserEntry};
use crate::target::{NewUser, UserInfo};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::VecDeque;
use tracing::{debug, warn};
use uuid::Uuid;

/// How a manifest version refers to principals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrincipalPolicy {
    /// Honor the `id` fields of groups and users
    pub use_ids: bool,
    /// Pass names through the principal translator
    pub translate_names: bool,
}

impl Default for PrincipalPolicy {
    fn default() -> Self {
        Self {
            use_ids: true,
            translate_names: false,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingGroup {
    id: Uuid,
    name: String,
    description: String,
    flags: i32,
    parent: String,
}

enum Attempt {
    Created,
    Deferred,
    Failed,
}

fn explicit_id(policy: PrincipalPolicy, id: Option<&str>) -> Uuid {
    if !policy.use_ids {
        return Uuid::new_v4();
    }
    id.and_then(|v| Uuid::parse_str(v.trim()).ok())
        .unwrap_or_else(Uuid::new_v4)
}

fn pending_group(
    ctx: &ImportContext<'_>,
    policy: PrincipalPolicy,
    entry: &GroupEntry,
) -> Option<PendingGroup> {
    let name = entry.name.as_deref().filter(|n| !n.is_empty())?;
    let translate = |name: &str| {
        if policy.translate_names {
            ctx.principals.translate_group(name)
        } else {
            name.to_string()
        }
    };
    Some(PendingGroup {
        id: explicit_id(policy, entry.id.as_deref()),
        name: translate(name),
        description: entry.description.clone().unwrap_or_default(),
        flags: parse_int(entry.flags.as_deref()),
        parent: entry
            .parent_group
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(translate)
            .unwrap_or_default(),
    })
}

fn try_create(ctx: &mut ImportContext<'_>, group: &PendingGroup) -> Attempt {
    if !group.parent.is_empty() {
        match ctx.repo.read_group(&group.parent) {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                debug!("Deferring group {} until {} exists", group.name, group.parent);
                return Attempt::Deferred;
            }
        }
    }

    let parent = (!group.parent.is_empty()).then_some(group.parent.as_str());
    match ctx
        .repo
        .create_group(group.id, &group.name, &group.description, group.flags, parent)
    {
        Ok(_) => {
            ctx.report.ok(&format!("Imported group {}", group.name));
            Attempt::Created
        }
        Err(e) => {
            ctx.report
                .warning(&format!("Group {} not created: {e}", group.name));
            Attempt::Failed
        }
    }
}

/// Create all groups, retrying those whose parent appears later
pub fn import_groups(
    ctx: &mut ImportContext<'_>,
    manifest: &Manifest,
    policy: PrincipalPolicy,
) -> Result<()> {
    if manifest.groups.is_empty() {
        return Ok(());
    }
    ctx.report.headline("Importing groups");

    let mut queue: VecDeque<PendingGroup> = VecDeque::new();
    for entry in &manifest.groups {
        let Some(group) = pending_group(ctx, policy, entry) else {
            ctx.report.warning("Skipping group entry without a name");
            continue;
        };
        if let Attempt::Deferred = try_create(ctx, &group) {
            queue.push_back(group);
        }
    }

    let mut pass = 0;
    while !queue.is_empty() {
        pass += 1;
        let snapshot = std::mem::take(&mut queue);
        let waiting = snapshot.len();
        let mut created = 0;

        for group in snapshot {
            match try_create(ctx, &group) {
                Attempt::Created => created += 1,
                Attempt::Deferred => queue.push_back(group),
                Attempt::Failed => {}
            }
        }
        debug!(
            "Group pass {}: {} of {} deferred groups created",
            pass, created, waiting
        );

        if created == 0 {
            for group in queue.drain(..) {
                warn!("Unresolvable parent {} for group {}", group.parent, group.name);
                ctx.report.warning(&format!(
                    "Group {} not created: parent group {} does not exist",
                    group.name, group.parent
                ));
            }
        }
    }
    Ok(())
}

fn decode_password(value: Option<&str>) -> Result<String> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Ok(String::new());
    }
    let bytes = STANDARD.decode(value)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read the serialized info blob of a user; failures leave it empty
fn read_user_info(ctx: &mut ImportContext<'_>, name: &str, entry: Option<&str>) -> UserInfo {
    let Some(entry) = entry.filter(|e| !e.is_empty()) else {
        return UserInfo::new();
    };
    let parsed = ctx
        .archive
        .read_entry(entry)
        .and_then(|bytes| serde_json::from_slice::<UserInfo>(&bytes).map_err(Error::from));
    match parsed {
        Ok(info) => info,
        Err(e) => {
            ctx.report
                .warning(&format!("User info of {name} not read from {entry}: {e}"));
            UserInfo::new()
        }
    }
}

fn new_user(
    ctx: &mut ImportContext<'_>,
    policy: PrincipalPolicy,
    name: String,
    entry: &UserEntry,
) -> Result<NewUser> {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let default_group = entry
        .default_group
        .as_deref()
        .filter(|g| !g.is_empty())
        .map(|g| {
            if policy.translate_names {
                ctx.principals.translate_group(g)
            } else {
                g.to_string()
            }
        });

    let mut user = NewUser {
        id: Some(explicit_id(policy, entry.id.as_deref())),
        password: decode_password(entry.password.as_deref())?,
        recovery_password: decode_password(entry.recovery_password.as_deref())?,
        description: text(&entry.description),
        flags: parse_int(entry.flags.as_deref()),
        first_name: text(&entry.first_name),
        last_name: text(&entry.last_name),
        email: text(&entry.email),
        address: text(&entry.address),
        section: text(&entry.section),
        default_group,
        user_type: parse_int(entry.user_type.as_deref()),
        info: UserInfo::new(),
        name,
    };
    user.info = read_user_info(ctx, &user.name, entry.user_info.as_deref());
    Ok(user)
}

/// Create all users and their group memberships
pub fn import_users(
    ctx: &mut ImportContext<'_>,
    manifest: &Manifest,
    policy: PrincipalPolicy,
) -> Result<()> {
    if manifest.users.is_empty() {
        return Ok(());
    }
    ctx.report.headline("Importing users");

    for entry in &manifest.users {
        let Some(name) = entry.name.as_deref().filter(|n| !n.is_empty()) else {
            ctx.report.warning("Skipping user entry without a name");
            continue;
        };
        let name = if policy.translate_names {
            ctx.principals.translate_user(name)
        } else {
            name.to_string()
        };

        let user = match new_user(ctx, policy, name.clone(), entry) {
            Ok(user) => user,
            Err(e) => {
                ctx.report.warning(&format!("User {name} not created: {e}"));
                continue;
            }
        };
        if let Err(e) = ctx.repo.create_user(&user) {
            ctx.report.warning(&format!("User {name} not created: {e}"));
            continue;
        }

        for group in &entry.groups {
            let group = if policy.translate_names {
                ctx.principals.translate_group(group)
            } else {
                group.clone()
            };
            if let Err(e) = ctx.repo.add_user_to_group(&name, &group) {
                ctx.report
                    .warning(&format!("User {name} not added to group {group}: {e}"));
            }
        }
        ctx.report.ok(&format!("Imported user {name}"));
    }
    Ok(())
}
