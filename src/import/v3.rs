// src/import/v3.rs

//! Version 3 archives
//!
//! Entries carry their own timestamps, owning users (by id), flags and
//! identities. Pages are already unified documents in the archive except
//! for leftovers of the older page types, which are converted in place.

use super::common::{self, ResourcePlan};
use super::context::ImportContext;
use super::registry::ResourceImporter;
use crate::error::Result;
use crate::manifest::{Manifest, ResourceEntry};
use crate::target::{
    DATE_EXPIRED_DEFAULT, DATE_RELEASED_DEFAULT, Resource, ResourceState, ResourceType,
};
use uuid::Uuid;

pub struct ImportVersion3;

/// Existing user with the given id, or the importing user
fn owner(ctx: &ImportContext<'_>, value: Option<&str>) -> Uuid {
    value
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .filter(|id| matches!(ctx.repo.read_user_by_id(*id), Ok(Some(_))))
        .unwrap_or(ctx.current_user.id)
}

impl ImportVersion3 {
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
        let date_last_modified = common::parse_millis(entry.date_last_modified.as_deref(), now)?;
        let date_created = common::parse_millis(entry.date_created.as_deref(), now)?;

        let properties = common::resolve_properties(ctx, entry)?;
        let content = common::read_content(ctx, entry)?;

        let resource = Resource {
            structure_id: common::parse_uuid(entry.uuid_structure.as_deref())?,
            resource_id: common::parse_uuid(entry.uuid_resource.as_deref())?,
            content_id: common::parse_uuid(entry.uuid_content.as_deref())?,
            path: path.clone(),
            resource_type: declared,
            flags: common::parse_int(entry.flags.as_deref()),
            state: ResourceState::New,
            date_created,
            user_created: owner(ctx, entry.user_created.as_deref()),
            date_last_modified,
            user_last_modified: owner(ctx, entry.user_last_modified.as_deref()),
            date_released: DATE_RELEASED_DEFAULT,
            date_expired: DATE_EXPIRED_DEFAULT,
            size: content.as_ref().map_or(0, |c| c.len() as i64),
        };

        let access_entries = common::access_entries(ctx, &path, entry, |ctx, ace| {
            common::principal_by_id(ctx, ace.principal.as_deref())
        });

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

impl ResourceImporter for ImportVersion3 {
    fn version(&self) -> u32 {
        3
    }

    fn import_resources(&self, ctx: &mut ImportContext<'_>, manifest: &Manifest) -> Result<()> {
        common::for_each_entry(ctx, manifest, |ctx, label, entry| {
            self.import_entry(ctx, label, entry)
        });
        Ok(())
    }
}
