// src/import/common.rs

//! Steps shared by the version-specific resource importers
//!
//! Each importer reads its own manifest fields and assembles a
//! [`ResourcePlan`]; policy checks, property resolution, legacy page
//! conversion and the final write are the same for every version.

use super::context::{ImportContext, PendingLink, progress_label};
use super::xmlpage::{self, DEFAULT_ELEMENT};
use crate::error::{Error, Result};
use crate::manifest::{AccessEntry, Manifest, ResourceEntry};
use crate::target::{AccessControlEntry, Property, Resource, ResourceType};
use chrono::DateTime;
use tracing::debug;
use uuid::Uuid;

/// A resource ready to be written
pub struct ResourcePlan {
    pub path: String,
    /// Type declared in the manifest, before any conversion
    pub declared_type: ResourceType,
    pub resource: Resource,
    pub content: Option<Vec<u8>>,
    pub properties: Vec<Property>,
    pub access_entries: Vec<AccessControlEntry>,
}

/// Run `import` for every resource entry in manifest order
///
/// An error from one entry becomes a report line; the loop continues.
pub fn for_each_entry<F>(ctx: &mut ImportContext<'_>, manifest: &Manifest, mut import: F)
where
    F: FnMut(&mut ImportContext<'_>, &str, &ResourceEntry) -> Result<()>,
{
    ctx.report.headline("Importing resources");
    let total = manifest.resources.len();
    for (index, entry) in manifest.resources.iter().enumerate() {
        let label = progress_label(index + 1, total);
        ctx.report.progress(index + 1, total);
        if let Err(e) = import(ctx, &label, entry) {
            let name = entry.destination.as_deref().unwrap_or("<unnamed>");
            ctx.report
                .error(&format!("{label} Failed to import {name}: {e}"));
        }
    }
}

/// Milliseconds since the epoch
pub fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn destination(entry: &ResourceEntry) -> Result<&str> {
    entry
        .destination
        .as_deref()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| Error::ParseError("resource entry without destination".to_string()))
}

pub fn type_name(entry: &ResourceEntry) -> Result<&str> {
    entry
        .resource_type
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::ParseError("resource entry without type".to_string()))
}

/// Translated absolute target path of an entry
pub fn target_path(ctx: &ImportContext<'_>, destination: &str, folder: bool) -> String {
    let full = ctx.full_path(destination, folder);
    let translated = ctx.translator.translate(&full);
    if translated != full {
        debug!("Translated {} to {}", full, translated);
    }
    translated
}

/// Immutability and exclude checks; `false` means the entry was skipped
pub fn admit(ctx: &mut ImportContext<'_>, label: &str, path: &str) -> bool {
    if ctx.config.is_immutable(path) {
        match ctx.repo.read_resource(path) {
            Ok(Some(existing)) if !existing.is_deleted() => {
                ctx.report
                    .skipped(&format!("{label} Skipping immutable resource {path}"));
                return false;
            }
            _ => {}
        }
    }

    if ctx.options.exclude.iter().any(|e| e == path) {
        ctx.report.skipped(&format!("{label} Skipping {path}"));
        return false;
    }
    true
}

/// Resolve the type name; unknown types skip the entry with a warning
pub fn resolve_type(
    ctx: &mut ImportContext<'_>,
    label: &str,
    path: &str,
    name: &str,
) -> Option<ResourceType> {
    match ctx.repo.resource_type(name) {
        Ok(resource_type) => Some(resource_type),
        Err(e) => {
            ctx.report
                .warning(&format!("{label} Skipping {path}: {e}"));
            None
        }
    }
}

/// Merge the stamp property and the declared properties, creating
/// definitions on first use
pub fn resolve_properties(
    ctx: &mut ImportContext<'_>,
    entry: &ResourceEntry,
) -> Result<Vec<Property>> {
    let mut properties: Vec<Property> = Vec::new();

    if let Some((key, value)) = &ctx.options.property
        && !key.is_empty()
    {
        properties.push(Property::structure(key.clone(), value.clone()));
    }

    for declared in &entry.properties {
        if ctx.config.is_ignored_property(&declared.name) {
            continue;
        }
        let index = match properties.iter().position(|p| p.key == declared.name) {
            Some(index) => index,
            None => {
                properties.push(Property::new(declared.name.clone()));
                properties.len() - 1
            }
        };
        let property = &mut properties[index];
        if declared.shared {
            property.resource_value = Some(declared.value.clone());
        } else {
            property.structure_value = Some(declared.value.clone());
        }
    }

    ctx.ensure_property_definitions(&properties)?;
    Ok(properties)
}

/// Content bytes of the entry's source, if it declares one
pub fn read_content(ctx: &mut ImportContext<'_>, entry: &ResourceEntry) -> Result<Option<Vec<u8>>> {
    match entry.source.as_deref().filter(|s| !s.is_empty()) {
        Some(source) => ctx.archive.read_entry(source).map(Some),
        None => Ok(None),
    }
}

/// Identity from the manifest, or a fresh one when absent
pub fn parse_uuid(value: Option<&str>) -> Result<Uuid> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => Ok(Uuid::parse_str(value)?),
        None => Ok(Uuid::new_v4()),
    }
}

pub fn parse_int(value: Option<&str>) -> i32 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

/// Numeric millisecond timestamp; absent means `default`
pub fn parse_millis(value: Option<&str>, default: i64) -> Result<i64> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .map_err(|_| Error::ParseError(format!("invalid timestamp: {value}"))),
        None => Ok(default),
    }
}

/// Numeric or date-header timestamp; absent means `default`, unreadable
/// means now
pub fn parse_date(value: Option<&str>, default: i64) -> i64 {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return default;
    };
    if let Ok(millis) = value.parse::<i64>() {
        return millis;
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return date.timestamp_millis();
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return date.timestamp_millis();
    }
    debug!("Unreadable date {:?}, using now", value);
    now()
}

/// Whether a group or user with this id exists in the target
pub fn principal_exists(ctx: &ImportContext<'_>, id: Uuid) -> bool {
    matches!(ctx.repo.read_group_by_id(id), Ok(Some(_)))
        || matches!(ctx.repo.read_user_by_id(id), Ok(Some(_)))
}

/// Resolve every declared entry, skipping unresolvable principals
pub fn access_entries<F>(
    ctx: &mut ImportContext<'_>,
    path: &str,
    entry: &ResourceEntry,
    mut principal: F,
) -> Vec<AccessControlEntry>
where
    F: FnMut(&ImportContext<'_>, &AccessEntry) -> Option<Uuid>,
{
    let mut resolved = Vec::with_capacity(entry.access_entries.len());
    for declared in &entry.access_entries {
        match principal(&*ctx, declared) {
            Some(id) => resolved.push(access_entry(id, declared)),
            None => {
                let reference = declared
                    .principal
                    .as_deref()
                    .or(declared.id.as_deref())
                    .unwrap_or("<none>");
                ctx.report.warning(&format!(
                    "Access control entry of {path} skipped: principal {reference} not found"
                ));
            }
        }
    }
    resolved
}

/// Principal given as a UUID that must exist in the target
pub fn principal_by_id(ctx: &ImportContext<'_>, value: Option<&str>) -> Option<Uuid> {
    let id = Uuid::parse_str(value?.trim()).ok()?;
    principal_exists(ctx, id).then_some(id)
}

/// Numeric access-control fields shared by all versions
pub fn access_entry(principal_id: Uuid, entry: &AccessEntry) -> AccessControlEntry {
    AccessControlEntry {
        resource_id: Uuid::nil(),
        principal_id,
        allowed: parse_int(entry.allowed.as_deref()),
        denied: parse_int(entry.denied.as_deref()),
        flags: parse_int(entry.flags.as_deref()),
    }
}

/// Convert a legacy page into a unified document in place
///
/// The type always switches; content is only converted when present.
pub fn convert_page(ctx: &mut ImportContext<'_>, plan: &mut ResourcePlan) {
    plan.resource.resource_type = ResourceType::XmlPage;
    let Some(content) = plan.content.as_deref().filter(|c| !c.is_empty()) else {
        return;
    };
    let text = ctx.decode_body(&plan.path, content, &plan.properties);
    let locale = ctx.locale_for(&plan.path, &plan.properties);
    debug!("Converting {} to a unified page ({})", plan.path, locale);
    plan.content = Some(xmlpage::convert_legacy_body(&text, DEFAULT_ELEMENT, &locale));
}

/// Write a planned resource, or park it in the pointer table if it is a link
pub fn store(ctx: &mut ImportContext<'_>, label: &str, plan: ResourcePlan) -> Option<Resource> {
    let ResourcePlan {
        path,
        declared_type,
        mut resource,
        content,
        properties,
        access_entries,
    } = plan;

    if resource.resource_type == ResourceType::Link {
        let target = content
            .as_deref()
            .map(|c| String::from_utf8_lossy(c).trim().to_string())
            .unwrap_or_default();
        resource.path = path.clone();
        ctx.links.insert(
            path.clone(),
            PendingLink {
                target,
                properties,
                resource,
                access_entries,
            },
        );
        ctx.report.ok(&format!("{label} Storing link {path}"));
        return None;
    }

    let data = if resource.is_folder() {
        None
    } else {
        content.as_deref()
    };
    let created = match ctx.repo.import_resource(&path, &resource, data, &properties) {
        Ok(created) => created,
        Err(e) => {
            ctx.report
                .error(&format!("{label} Failed to import {path}: {e}"));
            return None;
        }
    };

    ctx.record_written(&created.path, data);
    if declared_type.is_legacy_page() {
        ctx.imported_pages.push(created.path.clone());
    }
    ctx.report.ok(&format!("{label} Imported {}", created.path));

    if !access_entries.is_empty() {
        write_access_entries(ctx, &created, &access_entries);
    }
    Some(created)
}

/// One batched write; a failure is a warning on the resource
pub fn write_access_entries(
    ctx: &mut ImportContext<'_>,
    resource: &Resource,
    entries: &[AccessControlEntry],
) {
    let entries: Vec<AccessControlEntry> = entries
        .iter()
        .map(|e| AccessControlEntry {
            resource_id: resource.resource_id,
            ..*e
        })
        .collect();
    if let Err(e) = ctx.repo.import_access_control_entries(resource, &entries) {
        ctx.report.warning(&format!(
            "Access control entries of {} not written: {e}",
            resource.path
        ));
    }
}
