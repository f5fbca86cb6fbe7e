// src/import/v2.rs

//! Version 2 archives
//!
//! Timestamps are plain millisecond values, resources are owned by the
//! importing user, and pages still come as a control file plus a body
//! file under the bodies folder. Those pairs are merged after the main
//! pass.

use super::common::{self, ResourcePlan};
use super::context::ImportContext;
use super::registry::ResourceImporter;
use crate::error::Result;
use crate::manifest::{Manifest, ResourceEntry};
use crate::target::{
    DATE_EXPIRED_DEFAULT, DATE_RELEASED_DEFAULT, Resource, ResourceState, ResourceType,
};

/// Legacy script type, imported as plain text
const TYPE_SCRIPT: &str = "script";

pub struct ImportVersion2;

impl ImportVersion2 {
    fn import_entry(
        &self,
        ctx: &mut ImportContext<'_>,
        label: &str,
        entry: &ResourceEntry,
    ) -> Result<()> {
        let destination = common::destination(entry)?;
        let mut type_name = common::type_name(entry)?;
        if type_name.eq_ignore_ascii_case(TYPE_SCRIPT) {
            type_name = ResourceType::Plain.as_str();
        }
        let folder = type_name.eq_ignore_ascii_case(ResourceType::Folder.as_str());

        let path = common::target_path(ctx, destination, folder);
        if !common::admit(ctx, label, &path) {
            return Ok(());
        }
        let Some(declared) = common::resolve_type(ctx, label, &path, type_name) else {
            return Ok(());
        };

        let properties = common::resolve_properties(ctx, entry)?;
        let content = common::read_content(ctx, entry)?;
        let modified = common::parse_millis(entry.last_modified.as_deref(), common::now())?;
        let user = ctx.current_user.id;

        let resource = Resource {
            structure_id: common::parse_uuid(entry.uuid_structure.as_deref())?,
            resource_id: common::parse_uuid(entry.uuid_resource.as_deref())?,
            content_id: common::parse_uuid(entry.uuid_content.as_deref())?,
            path: path.clone(),
            resource_type: declared,
            flags: 0,
            state: ResourceState::New,
            date_created: modified,
            user_created: user,
            date_last_modified: modified,
            user_last_modified: user,
            date_released: DATE_RELEASED_DEFAULT,
            date_expired: DATE_EXPIRED_DEFAULT,
            size: content.as_ref().map_or(0, |c| c.len() as i64),
        };

        let access_entries = common::access_entries(ctx, &path, entry, |ctx, ace| {
            common::principal_by_id(ctx, ace.id.as_deref())
        });

        let mut plan = ResourcePlan {
            path: path.clone(),
            declared_type: declared,
            resource,
            content,
            properties,
            access_entries,
        };
        // newpage bodies are inline; page bodies are merged later
        if declared == ResourceType::NewPage && ctx.config.convert_to_xml_page {
            common::convert_page(ctx, &mut plan);
        }

        if common::store(ctx, label, plan).is_some() {
            if declared == ResourceType::Page {
                ctx.pages.push(path);
            } else if folder && is_body_folder(&ctx.config.bodies_folder, destination) {
                ctx.body_folders.push(path);
            }
        }
        Ok(())
    }
}

/// Folders below the legacy bodies root hold page bodies
fn is_body_folder(bodies_folder: &str, destination: &str) -> bool {
    let root = bodies_folder.trim_start_matches('/');
    !root.is_empty() && destination.trim_start_matches('/').starts_with(root)
}

impl ResourceImporter for ImportVersion2 {
    fn version(&self) -> u32 {
        2
    }

    fn import_resources(&self, ctx: &mut ImportContext<'_>, manifest: &Manifest) -> Result<()> {
        common::for_each_entry(ctx, manifest, |ctx, label, entry| {
            self.import_entry(ctx, label, entry)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_folder_detection() {
        assert!(is_body_folder("/system/bodies/", "system/bodies/news"));
        assert!(is_body_folder("/system/bodies/", "/system/bodies/news/archive"));
        assert!(!is_body_folder("/system/bodies/", "system/bodies"));
        assert!(!is_body_folder("/system/bodies/", "news"));
        assert!(!is_body_folder("", "news"));
    }
}
