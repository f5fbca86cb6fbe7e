// src/import/postprocess.rs

//! Passes that run after every resource entry was written
//!
//! Links are resolved once all their targets exist, legacy page control
//! files are merged with their bodies, and the emptied body folders are
//! removed.

use super::common;
use super::context::{ImportContext, PendingLink, progress_label};
use super::xmlpage::{self, DEFAULT_ELEMENT};
use crate::error::{Error, Result};
use crate::target::{
    DATE_EXPIRED_DEFAULT, DATE_RELEASED_DEFAULT, Property, Resource, ResourceState, ResourceType,
    parent_folder,
};
use crate::xml::Element;
use tracing::{debug, info};
use uuid::Uuid;

/// Property naming the master template of a merged page
pub const PROPERTY_TEMPLATE: &str = "template";

/// Property naming the body template class of a merged page
pub const PROPERTY_BODY_CLASS: &str = "templateclass";

/// Turn every parked link into a sibling of its target, or store it as a
/// link resource when its target is a literal value
///
/// The pointer table is empty afterwards.
pub fn convert_pointer_to_siblings(ctx: &mut ImportContext<'_>) {
    let links = std::mem::take(&mut ctx.links);
    if links.is_empty() {
        return;
    }
    ctx.report.headline("Converting links");

    let total = links.len();
    for (index, (path, link)) in links.into_iter().enumerate() {
        let label = progress_label(index + 1, total);
        let result = if link.target.starts_with('/') {
            create_sibling(ctx, &label, &path, &link)
        } else {
            create_link(ctx, &label, &path, &link)
        };
        if let Err(e) = result {
            ctx.report
                .error(&format!("{label} Failed to convert link {path}: {e}"));
        }
    }
}

fn create_sibling(
    ctx: &mut ImportContext<'_>,
    label: &str,
    path: &str,
    link: &PendingLink,
) -> Result<()> {
    let target_path = ctx.translator.translate(&link.target);
    let target = match ctx.repo.read_resource(&target_path)? {
        Some(target) if !target.is_deleted() && !target.is_folder() => target,
        _ => {
            ctx.report.warning(&format!(
                "{label} Link {path} not converted: link target not found {}",
                link.target
            ));
            return Ok(());
        }
    };

    let sibling = Resource {
        structure_id: Uuid::new_v4(),
        resource_id: target.resource_id,
        content_id: target.content_id,
        path: path.to_string(),
        resource_type: target.resource_type,
        flags: 0,
        state: ResourceState::New,
        date_created: target.date_created,
        user_created: target.user_created,
        date_last_modified: target.date_last_modified,
        user_last_modified: target.user_last_modified,
        date_released: DATE_RELEASED_DEFAULT,
        date_expired: DATE_EXPIRED_DEFAULT,
        size: target.size,
    };
    ctx.ensure_property_definitions(&link.properties)?;
    let created = ctx
        .repo
        .import_resource(path, &sibling, None, &link.properties)?;

    let content = ctx.repo.read_file(&created.path)?;
    ctx.record_written(&created.path, Some(&content));
    if !link.access_entries.is_empty() {
        // siblings share the access list of their target
        ctx.report.note(&format!(
            "{label} Access control entries of {path} dropped, {} keeps its own",
            target.path
        ));
    }
    ctx.report.ok(&format!(
        "{label} Converted link {path} to a sibling of {}",
        target.path
    ));
    Ok(())
}

fn create_link(
    ctx: &mut ImportContext<'_>,
    label: &str,
    path: &str,
    link: &PendingLink,
) -> Result<()> {
    ctx.ensure_property_definitions(&link.properties)?;
    let data = link.target.as_bytes();
    let created = ctx
        .repo
        .import_resource(path, &link.resource, Some(data), &link.properties)?;
    ctx.record_written(&created.path, Some(data));
    if !link.access_entries.is_empty() {
        common::write_access_entries(ctx, &created, &link.access_entries);
    }
    ctx.report.ok(&format!("{label} Stored link {path}"));
    Ok(())
}

/// Body template settings read from a legacy control file
#[derive(Debug, Default, PartialEq, Eq)]
struct ControlFile {
    master_template: String,
    /// `None` unless the file declares exactly one body element
    body: Option<BodyDefinition>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct BodyDefinition {
    class: String,
    template: String,
    parameters: Vec<(String, String)>,
}

impl ControlFile {
    fn parse(bytes: &[u8], page: &str) -> Result<Self> {
        let root = Element::parse(bytes)?;

        let masters = root.descendants("masterTemplate");
        let master_template = match masters.as_slice() {
            [master] => master.text.trim().to_string(),
            _ => String::new(),
        };

        let definitions = root.descendants("ELEMENTDEF");
        let body = match definitions.as_slice() {
            [definition] => Some(BodyDefinition::from_element(definition, page)),
            _ => None,
        };
        Ok(Self {
            master_template,
            body,
        })
    }
}

impl BodyDefinition {
    fn from_element(definition: &Element, page: &str) -> Self {
        let class = definition.child_text("CLASS").unwrap_or_default();
        let mut template = definition.child_text("TEMPLATE").unwrap_or_default();
        if !template.is_empty() && !template.starts_with('/') {
            let folder = parent_folder(page).unwrap_or_else(|| "/".to_string());
            template = normalize_path(&format!("{folder}{template}"));
        }
        let parameters = definition
            .children_named("PARAMETER")
            .filter_map(|p| {
                let name = p.attr("name")?.trim();
                (!name.is_empty()).then(|| (name.to_string(), p.text.trim().to_string()))
            })
            .collect();
        Self {
            class,
            template,
            parameters,
        }
    }
}

/// Collapse `.` and `..` segments of an absolute path
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let mut normalized = format!("/{}", segments.join("/"));
    if path.ends_with('/') && normalized.len() > 1 {
        normalized.push('/');
    }
    normalized
}

/// Locate an absolute body path as it was stored by this run
///
/// Control files name bodies relative to the archive root, so the import
/// root and translation are tried before the literal path.
fn locate_body(ctx: &ImportContext<'_>, template: &str) -> Result<String> {
    let candidates = [
        ctx.translator.translate(&ctx.full_path(template, false)),
        ctx.translator.translate(template),
        template.to_string(),
    ];
    for candidate in candidates {
        if let Some(found) = ctx.repo.read_resource(&candidate)?
            && !found.is_deleted()
        {
            return Ok(found.path);
        }
    }
    Err(Error::NotFoundError(format!("body file {template}")))
}

/// Merge every recorded legacy page with its body file
pub fn merge_page_files(ctx: &mut ImportContext<'_>) {
    let pages = std::mem::take(&mut ctx.pages);
    if pages.is_empty() {
        return;
    }
    ctx.report.headline("Merging page files");

    let total = pages.len();
    for (index, page) in pages.iter().enumerate() {
        let label = progress_label(index + 1, total);
        ctx.report.progress(index + 1, total);
        if let Err(e) = merge_page_file(ctx, &label, page) {
            ctx.report
                .error(&format!("{label} Failed to merge {page}: {e}"));
        }
    }
}

fn merge_page_file(ctx: &mut ImportContext<'_>, label: &str, page: &str) -> Result<()> {
    let mut resource = ctx
        .repo
        .read_resource(page)?
        .ok_or_else(|| Error::NotFoundError(page.to_string()))?;
    let control = ctx.repo.read_file(page)?;
    let parsed = ControlFile::parse(&control, page)?;

    let Some(body) = parsed.body else {
        ctx.repo.lock_resource(page)?;
        resource.resource_type = ResourceType::Plain;
        let written = ctx.repo.write_file(&resource, &control);
        ctx.repo.unlock_resource(page)?;
        written?;
        ctx.report
            .note(&format!("{label} {page} not converted, stored as plain text"));
        return Ok(());
    };
    if body.template.is_empty() {
        return Err(Error::ParseError(format!(
            "control file {page} names no body template"
        )));
    }

    let body_path = locate_body(ctx, &body.template)?;

    ctx.repo.lock_resource(page)?;
    let merged = write_merged_page(
        ctx,
        &mut resource,
        &parsed.master_template,
        &body,
        &body_path,
    );
    ctx.repo.unlock_resource(page)?;
    merged?;

    ctx.repo.lock_resource(&body_path)?;
    ctx.repo.delete_resource(&body_path, true)?;
    debug!("Removed body {} of {}", body_path, page);
    ctx.report.ok(&format!("{label} Merged {page}"));
    Ok(())
}

fn write_merged_page(
    ctx: &mut ImportContext<'_>,
    resource: &mut Resource,
    master_template: &str,
    body: &BodyDefinition,
    body_path: &str,
) -> Result<()> {
    let page = resource.path.clone();
    let properties = ctx.repo.read_properties(&page)?;
    let body_properties = ctx.repo.read_properties(body_path)?;
    let raw = ctx.repo.read_file(body_path)?;

    let text = ctx.decode_body(body_path, &raw, &body_properties);
    let locale = ctx.locale_for(&page, &properties);
    let content = xmlpage::convert_legacy_body(&text, DEFAULT_ELEMENT, &locale);

    resource.resource_type = ResourceType::XmlPage;
    let written = ctx.repo.write_file(resource, &content)?;
    ctx.record_written(&written.path, Some(&content));

    let mut merged: Vec<Property> = Vec::new();
    if !master_template.is_empty() {
        merged.push(Property::structure(PROPERTY_TEMPLATE, master_template));
    }
    if !body.class.is_empty() {
        merged.push(Property::structure(PROPERTY_BODY_CLASS, body.class.as_str()));
    }
    for (name, value) in &body.parameters {
        merged.push(Property::structure(name.as_str(), value.as_str()));
    }
    ctx.ensure_property_definitions(&merged)?;
    for property in &merged {
        ctx.repo.write_property(&page, property)?;
    }
    Ok(())
}

/// Delete the recorded body folders that the merge left empty, deepest
/// first
pub fn remove_folders(ctx: &mut ImportContext<'_>) {
    let folders = std::mem::take(&mut ctx.body_folders);
    if folders.is_empty() {
        return;
    }
    ctx.report.headline("Removing body folders");

    let total = folders.len();
    for (index, folder) in folders.iter().rev().enumerate() {
        let label = progress_label(index + 1, total);
        let result = remove_if_empty(ctx, folder);
        match result {
            Ok(true) => ctx.report.ok(&format!("{label} Removed folder {folder}")),
            Ok(false) => debug!("Keeping non-empty folder {}", folder),
            Err(e) => ctx
                .report
                .error(&format!("{label} Failed to remove {folder}: {e}")),
        }
    }
    info!("Body folder cleanup finished");
}

fn remove_if_empty(ctx: &mut ImportContext<'_>, folder: &str) -> Result<bool> {
    match ctx.repo.read_resource(folder)? {
        Some(found) if !found.is_deleted() => {}
        _ => return Ok(false),
    }
    if !ctx.repo.files_in_folder(folder)?.is_empty()
        || !ctx.repo.sub_folders(folder)?.is_empty()
    {
        return Ok(false);
    }
    ctx.repo.lock_resource(folder)?;
    ctx.repo.delete_resource(folder, false)?;
    Ok(true)
}
