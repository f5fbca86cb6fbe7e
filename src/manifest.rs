// src/manifest.rs

//! Typed view of `manifest.xml`
//!
//! The manifest is parsed once into records of raw, trimmed strings. How a
//! value is interpreted (timestamp format, identifier kind, principal
//! reference style) depends on the export version and is left to the
//! version-specific importers.

use crate::error::Result;
use crate::xml::Element;

/// Version marker element
pub const TAG_VERSION: &str = "export_version";

/// Export metadata from the `<info>` block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportInfo {
    pub creator: Option<String>,
    pub opencms_version: Option<String>,
    pub create_date: Option<String>,
    pub project: Option<String>,
}

/// A `<groupdata>` entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupEntry {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub flags: Option<String>,
    pub parent_group: Option<String>,
}

/// A `<userdata>` entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserEntry {
    pub id: Option<String>,
    pub name: Option<String>,
    /// Base64 encoded
    pub password: Option<String>,
    /// Base64 encoded
    pub recovery_password: Option<String>,
    pub description: Option<String>,
    pub flags: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub section: Option<String>,
    pub default_group: Option<String>,
    pub user_type: Option<String>,
    /// Archive entry holding the serialized user info
    pub user_info: Option<String>,
    pub groups: Vec<String>,
}

/// A property declared on a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEntry {
    pub name: String,
    pub value: String,
    /// `type="shared"` values belong to the resource, others to the structure
    pub shared: bool,
}

/// An `<accessentry>` declared on a resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessEntry {
    /// Principal UUID (version 2)
    pub id: Option<String>,
    /// Principal UUID (version 3) or `GROUP.name` / `USER.name` (version 4)
    pub principal: Option<String>,
    pub flags: Option<String>,
    pub allowed: Option<String>,
    pub denied: Option<String>,
}

/// A `<file>` entry: one folder or file to import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceEntry {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub resource_type: Option<String>,
    pub uuid_structure: Option<String>,
    pub uuid_resource: Option<String>,
    pub uuid_content: Option<String>,
    /// Version 2 modification date
    pub last_modified: Option<String>,
    pub date_last_modified: Option<String>,
    pub user_last_modified: Option<String>,
    pub date_created: Option<String>,
    pub user_created: Option<String>,
    pub date_released: Option<String>,
    pub date_expired: Option<String>,
    pub flags: Option<String>,
    pub properties: Vec<PropertyEntry>,
    pub access_entries: Vec<AccessEntry>,
}

/// Parsed manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Export version, 0 when the marker is absent or unparseable
    pub version: u32,
    pub info: ExportInfo,
    pub groups: Vec<GroupEntry>,
    pub users: Vec<UserEntry>,
    pub resources: Vec<ResourceEntry>,
}

impl Manifest {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let root = Element::parse(bytes)?;
        Ok(Self::from_element(&root))
    }

    pub fn from_element(root: &Element) -> Self {
        let info = root
            .find("info")
            .map(|info| ExportInfo {
                creator: text(info, "creator"),
                opencms_version: text(info, "opencms_version"),
                create_date: text(info, "createdate"),
                project: text(info, "project"),
            })
            .unwrap_or_default();

        Self {
            version: detect_version(root),
            info,
            groups: root.descendants("groupdata").into_iter().map(parse_group).collect(),
            users: root.descendants("userdata").into_iter().map(parse_user).collect(),
            resources: root.descendants("file").into_iter().map(parse_resource).collect(),
        }
    }
}

/// Read the export version marker; absent or unparseable means 0
pub fn detect_version(root: &Element) -> u32 {
    root.find(TAG_VERSION)
        .and_then(|e| e.text.trim().parse().ok())
        .unwrap_or(0)
}

/// Trimmed child text; elements that are absent yield `None`
fn text(element: &Element, name: &str) -> Option<String> {
    element.child_text(name)
}

fn parse_group(element: &Element) -> GroupEntry {
    GroupEntry {
        id: text(element, "id"),
        name: text(element, "name"),
        description: text(element, "description"),
        flags: text(element, "flags"),
        parent_group: text(element, "parentgroup"),
    }
}

fn parse_user(element: &Element) -> UserEntry {
    let groups = element
        .descendants("groupname")
        .into_iter()
        .filter_map(|g| text(g, "name"))
        .collect();

    UserEntry {
        id: text(element, "id"),
        name: text(element, "name"),
        password: text(element, "password"),
        recovery_password: text(element, "recoverypassword"),
        description: text(element, "description"),
        flags: text(element, "flags"),
        first_name: text(element, "firstname"),
        last_name: text(element, "lastname"),
        email: text(element, "email"),
        address: text(element, "address"),
        section: text(element, "section"),
        default_group: text(element, "defaultgroup"),
        user_type: text(element, "type"),
        user_info: text(element, "userinfo"),
        groups,
    }
}

fn parse_resource(element: &Element) -> ResourceEntry {
    let properties = element
        .child("properties")
        .map(|props| {
            props
                .children_named("property")
                .filter_map(|p| {
                    let name = text(p, "name")?;
                    Some(PropertyEntry {
                        name,
                        value: text(p, "value").unwrap_or_default(),
                        shared: p.attr("type") == Some("shared"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let access_entries = element
        .descendants("accessentry")
        .into_iter()
        .map(|ace| {
            // allowed/denied may sit inside a <permissionset>
            let holder = ace.child("permissionset").unwrap_or(ace);
            AccessEntry {
                id: text(ace, "id"),
                principal: text(ace, "uuidprincipal"),
                flags: text(ace, "flags"),
                allowed: text(holder, "allowed").or_else(|| text(ace, "allowed")),
                denied: text(holder, "denied").or_else(|| text(ace, "denied")),
            }
        })
        .collect();

    ResourceEntry {
        source: text(element, "source"),
        destination: text(element, "destination"),
        resource_type: text(element, "type"),
        uuid_structure: text(element, "uuidstructure"),
        uuid_resource: text(element, "uuidresource"),
        uuid_content: text(element, "uuidcontent"),
        last_modified: text(element, "lastmodified"),
        date_last_modified: text(element, "datelastmodified"),
        user_last_modified: text(element, "userlastmodified"),
        date_created: text(element, "datecreated"),
        user_created: text(element, "usercreated"),
        date_released: text(element, "datereleased"),
        date_expired: text(element, "dateexpired"),
        flags: text(element, "flags"),
        properties,
        access_entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<export>
  <info>
    <creator>Admin</creator>
    <opencms_version>5.0</opencms_version>
    <createdate>Mon, 01 Mar 2004 10:00:00 GMT</createdate>
    <project>Offline</project>
    <export_version>4</export_version>
  </info>
  <usergroupdata>
    <groupdata>
      <name>editors</name>
      <description>Editors</description>
      <flags>0</flags>
      <parentgroup>staff</parentgroup>
    </groupdata>
    <userdata>
      <name>alice</name>
      <password>c2VjcmV0</password>
      <recoverypassword></recoverypassword>
      <flags>0</flags>
      <usergroups>
        <groupname><name>editors</name></groupname>
        <groupname><name>staff</name></groupname>
      </usergroups>
    </userdata>
  </usergroupdata>
  <files>
    <file>
      <destination>news</destination>
      <type>folder</type>
    </file>
    <file>
      <source>news/index.html</source>
      <destination>news/index.html</destination>
      <type>plain</type>
      <uuidresource>2d1c4a8e-1f2b-4c3d-9e8f-0a1b2c3d4e5f</uuidresource>
      <datelastmodified>1078135200000</datelastmodified>
      <flags>0</flags>
      <properties>
        <property><name>Title</name><value>News</value></property>
        <property type="shared"><name>locale</name><value>de</value></property>
        <property><name>empty</name></property>
      </properties>
      <accesscontrol>
        <accessentry>
          <uuidprincipal>GROUP.editors</uuidprincipal>
          <flags>0</flags>
          <permissionset><allowed>3</allowed><denied>0</denied></permissionset>
        </accessentry>
      </accesscontrol>
    </file>
  </files>
</export>"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(MANIFEST.as_bytes()).unwrap();
        assert_eq!(manifest.version, 4);
        assert_eq!(manifest.info.creator.as_deref(), Some("Admin"));
        assert_eq!(manifest.info.project.as_deref(), Some("Offline"));

        assert_eq!(manifest.groups.len(), 1);
        assert_eq!(manifest.groups[0].parent_group.as_deref(), Some("staff"));

        assert_eq!(manifest.users.len(), 1);
        let user = &manifest.users[0];
        assert_eq!(user.password.as_deref(), Some("c2VjcmV0"));
        assert_eq!(user.recovery_password.as_deref(), Some(""));
        assert_eq!(user.groups, vec!["editors".to_string(), "staff".to_string()]);

        assert_eq!(manifest.resources.len(), 2);
        assert_eq!(manifest.resources[0].source, None);
        let file = &manifest.resources[1];
        assert_eq!(file.source.as_deref(), Some("news/index.html"));
        assert_eq!(file.properties.len(), 3);
        assert!(!file.properties[0].shared);
        assert!(file.properties[1].shared);
        assert_eq!(file.properties[2].value, "");
        assert_eq!(file.access_entries.len(), 1);
        assert_eq!(file.access_entries[0].principal.as_deref(), Some("GROUP.editors"));
        assert_eq!(file.access_entries[0].allowed.as_deref(), Some("3"));
    }

    #[test]
    fn test_missing_version_is_zero() {
        let manifest = Manifest::parse(b"<export><files/></export>").unwrap();
        assert_eq!(manifest.version, 0);
        assert!(manifest.resources.is_empty());
    }

    #[test]
    fn test_unparseable_version_is_zero() {
        let manifest =
            Manifest::parse(b"<export><info><export_version>x4</export_version></info></export>")
                .unwrap();
        assert_eq!(manifest.version, 0);
    }

    #[test]
    fn test_malformed_manifest() {
        assert!(Manifest::parse(b"<export><files></export>").is_err());
    }

    #[test]
    fn test_version2_ace_id() {
        let manifest = Manifest::parse(
            br#"<export><files><file><destination>a</destination><type>folder</type>
<accesscontrol><accessentry><id>11111111-1111-1111-1111-111111111111</id><flags>1</flags>
<allowed>5</allowed><denied>2</denied></accessentry></accesscontrol></file></files></export>"#,
        )
        .unwrap();
        let ace = &manifest.resources[0].access_entries[0];
        assert_eq!(ace.id.as_deref(), Some("11111111-1111-1111-1111-111111111111"));
        assert_eq!(ace.allowed.as_deref(), Some("5"));
        assert_eq!(ace.denied.as_deref(), Some("2"));
    }
}
