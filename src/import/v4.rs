// src/import/v4.rs

//! Version 4 archives
//!
//! Users are referenced by name and pass through the principal translator,
//! dates may be written as date headers, and access entries name their
//! principal as `GROUP.<name>` or `USER.<name>`. Siblings sharing a resource
//! id may omit their source; they reuse the bytes of the first sibling.

use super::common::{self, ResourcePlan};
use super::context::ImportContext;
use super::principals::PrincipalPolicy;
use super::registry::ResourceImporter;
use crate::error::Result;
use crate::manifest::{AccessEntry, Manifest, ResourceEntry};
use crate::target::{
    DATE_EXPIRED_DEFAULT, DATE_RELEASED_DEFAULT, Resource, ResourceState, ResourceType,
};
use tracing::debug;
use uuid::Uuid;

const GROUP_PREFIX: &str = "GROUP.";
const USER_PREFIX: &str = "USER.";

pub struct ImportVersion4;

/// Existing user with the given (translated) name, or the importing user
fn owner(ctx: &ImportContext<'_>, value: Option<&str>) -> Uuid {
    let Some(name) = value.map(str::trim).filter(|n| !n.is_empty()) else {
        return ctx.current_user.id;
    };
    let name = ctx.principals.translate_user(name);
    match ctx.repo.read_user(&name) {
        Ok(Some(user)) => user.id,
        _ => {
            debug!("Unknown user {}, using {}", name, ctx.current_user.name);
            ctx.current_user.id
        }
    }
}

/// Principal of an access entry: a prefixed name or a raw id
fn principal(ctx: &ImportContext<'_>, entry: &AccessEntry) -> Option<Uuid> {
    let value = entry.principal.as_deref()?.trim();
    if let Some(name) = value.strip_prefix(GROUP_PREFIX) {
        let name = ctx.principals.translate_group(name);
        return ctx.repo.read_group(&name).ok().flatten().map(|g| g.id);
    }
    if let Some(name) = value.strip_prefix(USER_PREFIX) {
        let name = ctx.principals.translate_user(name);
        return ctx.repo.read_user(&name).ok().flatten().map(|u| u.id);
    }
    common::principal_by_id(ctx, Some(value))
}

impl ImportVersion4 {
    /// Source bytes, falling back to an earlier sibling's source
    fn content(
        &self,
        ctx: &mut ImportContext<'_>,
        entry: &ResourceEntry,
        folder: bool,
    ) -> Result<Option<Vec<u8>>> {
        let resource_key = entry
            .uuid_resource
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let source = entry.source.as_deref().filter(|s| !s.is_empty());

        match (source, resource_key) {
            (Some(source), Some(key)) => {
                ctx.resource_sources
                    .entry(key.to_string())
                    .or_insert_with(|| source.to_string());
            }
            (None, Some(key)) if !folder => {
                if let Some(shared) = ctx.resource_sources.get(key).cloned() {
                    debug!("Reusing {} for sibling {}", shared, key);
                    return ctx.archive.read_entry(&shared).map(Some);
                }
            }
            _ => {}
        }
        common::read_content(ctx, entry)
    }

    fn import_entry(
        &self,
        ctx: &mut ImportContext<'_>,
        label: &str,
        entry: &ResourceEntry,
    ) -> Result<()> {
        let destination = common::destination(entry)?;
        let type_name = common::type_name(entry)?;
        let folder = type_name.eq_ignore_ascii_case(ResourceType::Folder.as_str());

        let path = common::target_path(ctx, destination, folder);
        if !common::admit(ctx, label, &path) {
            return Ok(());
        }
        let Some(declared) = common::resolve_type(ctx, label, &path, type_name) else {
            return Ok(());
        };

        let now = common::now();
        let properties = common::resolve_properties(ctx, entry)?;
        let content = self.content(ctx, entry, folder)?;

        let resource = Resource {
            structure_id: common::parse_uuid(entry.uuid_structure.as_deref())?,
            resource_id: common::parse_uuid(entry.uuid_resource.as_deref())?,
            content_id: common::parse_uuid(entry.uuid_content.as_deref())?,
            path: path.clone(),
            resource_type: declared,
            flags: common::parse_int(entry.flags.as_deref()),
            state: ResourceState::New,
            date_created: common::parse_date(entry.date_created.as_deref(), now),
            user_created: owner(ctx, entry.user_created.as_deref()),
            date_last_modified: common::parse_date(entry.date_last_modified.as_deref(), now),
            user_last_modified: owner(ctx, entry.user_last_modified.as_deref()),
            date_released: common::parse_date(
                entry.date_released.as_deref(),
                DATE_RELEASED_DEFAULT,
            ),
            date_expired: common::parse_date(entry.date_expired.as_deref(), DATE_EXPIRED_DEFAULT),
            size: content.as_ref().map_or(0, |c| c.len() as i64),
        };

        let access_entries = common::access_entries(ctx, &path, entry, principal);

        let mut plan = ResourcePlan {
            path,
            declared_type: declared,
            resource,
            content,
            properties,
            access_entries,
        };
        if declared.is_legacy_page() && ctx.config.convert_to_xml_page {
            common::convert_page(ctx, &mut plan);
        }

        common::store(ctx, label, plan);
        Ok(())
    }
}

impl ResourceImporter for ImportVersion4 {
    fn version(&self) -> u32 {
        4
    }

    fn principal_policy(&self) -> PrincipalPolicy {
        PrincipalPolicy {
            use_ids: false,
            translate_names: true,
        }
    }

    fn import_resources(&self, ctx: &mut ImportContext<'_>, manifest: &Manifest) -> Result<()> {
        common::for_each_entry(ctx, manifest, |ctx, label, entry| {
            self.import_entry(ctx, label, entry)
        });
        Ok(())
    }
}
