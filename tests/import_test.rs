// tests/import_test.rs

//! End-to-end import runs against an in-memory repository.

mod common;

use common::{ArchiveFixture, folder, repo, run, run_with};
use vfsimport::db::migrations::{ADMIN_GROUP_ID, ADMIN_USER_ID};
use vfsimport::import::XmlPage;
use vfsimport::report::ReportFormat;
use vfsimport::target::{ResourceType, TargetRepository};
use vfsimport::{Error, ImportConfig, ImportOptions};

const STRUCTURE_ID: &str = "9f6c1b8e-2d3a-4e5f-8a7b-6c5d4e3f2a1b";
const RESOURCE_ID: &str = "1e2d3c4b-5a69-4788-97a6-b5c4d3e2f1a0";
const CONTENT_ID: &str = "0a1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d";

fn docs_archive() -> ArchiveFixture {
    let body = format!(
        r#"<files>
  {}
  <file>
    <source>docs/a.txt</source>
    <destination>docs/a.txt</destination>
    <type>plain</type>
    <uuidstructure>{STRUCTURE_ID}</uuidstructure>
    <uuidresource>{RESOURCE_ID}</uuidresource>
    <uuidcontent>{CONTENT_ID}</uuidcontent>
    <datelastmodified>1078135200000</datelastmodified>
    <datecreated>1078131600000</datecreated>
    <flags>0</flags>
    <properties>
      <property><name>Title</name><value>Alpha</value></property>
    </properties>
  </file>
  <file>
    <source>docs/b.txt</source>
    <destination>docs/b.txt</destination>
    <type>plain</type>
  </file>
</files>"#,
        folder("docs")
    );
    ArchiveFixture::new(3, &body)
        .file("docs/a.txt", "alpha")
        .file("docs/b.txt", "beta")
}

#[test]
fn test_resources_created_in_manifest_order() {
    let repo = repo();
    let archive = docs_archive();

    let (outcome, report) = run(&repo, &archive, ImportConfig::default());
    let outcome = outcome.unwrap();

    assert_eq!(outcome.version, 3);
    assert_eq!(
        outcome.written_paths(),
        vec!["/docs/", "/docs/a.txt", "/docs/b.txt"]
    );
    assert_eq!(outcome.file_codes().len(), 2);
    assert_eq!(outcome.summary.errors, 0);
    assert!(report.contains("Import Version 3"));
    assert!(report.contains("( 2 / 3 ) Imported /docs/a.txt"));
    assert_eq!(repo.read_file("/docs/b.txt").unwrap(), b"beta");
}

#[test]
fn test_identities_round_trip() {
    let repo = repo();
    let (outcome, _) = run(&repo, &docs_archive(), ImportConfig::default());
    outcome.unwrap();

    let a = repo.read_resource("/docs/a.txt").unwrap().unwrap();
    assert_eq!(a.structure_id.to_string(), STRUCTURE_ID);
    assert_eq!(a.resource_id.to_string(), RESOURCE_ID);
    assert_eq!(a.content_id.to_string(), CONTENT_ID);
    assert_eq!(a.date_last_modified, 1_078_135_200_000);
    assert_eq!(a.date_created, 1_078_131_600_000);
    assert_eq!(a.user_created, ADMIN_USER_ID);

    let b = repo.read_resource("/docs/b.txt").unwrap().unwrap();
    assert!(!b.structure_id.is_nil());
    assert!(!b.resource_id.is_nil());
    assert!(!b.content_id.is_nil());
    assert_ne!(b.structure_id, b.resource_id);
    assert_ne!(b.resource_id, b.content_id);

    let title = repo.read_property("/docs/a.txt", "Title", false).unwrap();
    assert_eq!(title.unwrap().value(), Some("Alpha"));
}

#[test]
fn test_zip_archive_imports_like_directory() {
    let repo = repo();
    let archive = docs_archive();
    let out = tempfile::tempdir().unwrap();
    let zip_path = archive.zip(&out);

    let (outcome, _) = run_with(
        &repo,
        &zip_path,
        "/",
        ImportConfig::default(),
        &ImportOptions::default(),
    );
    assert_eq!(outcome.unwrap().written.len(), 3);
    assert_eq!(repo.read_file("/docs/a.txt").unwrap(), b"alpha");
}

#[test]
fn test_immutable_resource_left_unchanged() {
    let repo = repo();
    let config = ImportConfig {
        immutable_resources: vec!["/docs/a.txt".to_string()],
        ..ImportConfig::default()
    };

    let (outcome, _) = run(&repo, &docs_archive(), config.clone());
    outcome.unwrap();
    assert_eq!(repo.read_file("/docs/a.txt").unwrap(), b"alpha");

    let changed = docs_archive()
        .file("docs/a.txt", "changed")
        .file("docs/b.txt", "changed");
    let (outcome, report) = run(&repo, &changed, config);
    let outcome = outcome.unwrap();

    assert_eq!(repo.read_file("/docs/a.txt").unwrap(), b"alpha");
    assert_eq!(repo.read_file("/docs/b.txt").unwrap(), b"changed");
    assert_eq!(outcome.summary.skipped, 1);
    assert!(report.contains("Skipping immutable resource /docs/a.txt"));
}

#[test]
fn test_excluded_path_not_created() {
    let repo = repo();
    let options = ImportOptions {
        exclude: vec!["/docs/b.txt".to_string()],
        property: Some(("origin".to_string(), "legacy".to_string())),
    };
    let archive = docs_archive();

    let (outcome, report) = run_with(
        &repo,
        archive.path(),
        "/",
        ImportConfig::default(),
        &options,
    );
    outcome.unwrap();

    assert!(repo.read_resource("/docs/b.txt").unwrap().is_none());
    assert!(report.contains("Skipping /docs/b.txt"));
    let origin = repo.read_property("/docs/a.txt", "origin", false).unwrap();
    assert_eq!(origin.unwrap().value(), Some("legacy"));
}

#[test]
fn test_unknown_type_skips_only_that_entry() {
    let repo = repo();
    let body = r#"<files>
  <file><source>w.bin</source><destination>w.bin</destination><type>widget</type></file>
  <file><source>x.txt</source><destination>x.txt</destination><type>plain</type></file>
</files>"#;
    let archive = ArchiveFixture::new(3, body)
        .file("w.bin", "w")
        .file("x.txt", "x");

    let (outcome, report) = run(&repo, &archive, ImportConfig::default());
    let outcome = outcome.unwrap();

    assert_eq!(outcome.written_paths(), vec!["/x.txt"]);
    assert!(repo.read_resource("/w.bin").unwrap().is_none());
    assert_eq!(report.messages(ReportFormat::Warning).len(), 1);
}

#[test]
fn test_unsupported_version_is_fatal() {
    let repo = repo();
    let archive = ArchiveFixture::new(7, "<files/>");

    let (outcome, report) = run(&repo, &archive, ImportConfig::default());
    assert!(matches!(outcome, Err(Error::UnsupportedVersion(7))));
    assert_eq!(report.messages(ReportFormat::Error).len(), 1);
    // the target is still notified once the archive was opened
    assert_eq!(repo.cache_generation().unwrap(), 1);
}

#[test]
fn test_missing_archive_is_fatal() {
    let repo = repo();
    let dir = tempfile::tempdir().unwrap();
    let (outcome, report) = run_with(
        &repo,
        &dir.path().join("nope.zip"),
        "/",
        ImportConfig::default(),
        &ImportOptions::default(),
    );
    assert!(outcome.is_err());
    assert!(!report.messages(ReportFormat::Error).is_empty());
    assert_eq!(repo.cache_generation().unwrap(), 0);
}

#[test]
fn test_groups_with_later_parent() {
    let repo = repo();
    let body = r#"<usergroupdata>
  <groupdata><name>editors</name><description>Editors</description><parentgroup>staff</parentgroup></groupdata>
  <groupdata><name>loop-a</name><parentgroup>loop-b</parentgroup></groupdata>
  <groupdata><name>loop-b</name><parentgroup>loop-a</parentgroup></groupdata>
  <groupdata><name>staff</name><description>Staff</description></groupdata>
  <userdata>
    <name>jdoe</name>
    <password>c2VjcmV0</password>
    <firstname>Jane</firstname>
    <userinfo>users/jdoe.json</userinfo>
    <groups>
      <groupname><name>editors</name></groupname>
      <groupname><name>nobody</name></groupname>
    </groups>
  </userdata>
</usergroupdata>
<files/>"#;
    let archive = ArchiveFixture::new(3, body).file("users/jdoe.json", r#"{"city": "Berlin"}"#);

    let (outcome, report) = run(&repo, &archive, ImportConfig::default());
    outcome.unwrap();

    let staff = repo.read_group("staff").unwrap().unwrap();
    let editors = repo.read_group("editors").unwrap().unwrap();
    assert_eq!(editors.parent_id, Some(staff.id));
    assert!(repo.read_group("loop-a").unwrap().is_none());
    assert!(repo.read_group("loop-b").unwrap().is_none());
    assert!(report.contains("Group loop-a not created"));
    assert!(report.contains("Group loop-b not created"));

    let user = repo.read_user("jdoe").unwrap().unwrap();
    assert_eq!(user.first_name, "Jane");
    assert_eq!(user.info.get("city").and_then(|v| v.as_str()), Some("Berlin"));
    let groups: Vec<String> = repo
        .user_groups("jdoe")
        .unwrap()
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert!(groups.contains(&"editors".to_string()));
    assert!(report.contains("User jdoe not added to group nobody"));
}

#[test]
fn test_principals_skipped_without_admin_session() {
    let mut repo = repo();
    repo.login("Guest").unwrap();
    let body = r#"<usergroupdata><groupdata><name>staff</name></groupdata></usergroupdata><files/>"#;
    let archive = ArchiveFixture::new(3, body);

    let (outcome, _) = run(&repo, &archive, ImportConfig::default());
    outcome.unwrap();
    assert!(repo.read_group("staff").unwrap().is_none());
}

#[test]
fn test_unresolvable_access_entry_skipped() {
    let repo = repo();
    let body = format!(
        r#"<files>
  <file>
    <source>secure.txt</source>
    <destination>secure.txt</destination>
    <type>plain</type>
    <accesscontrol>
      <accessentry>
        <uuidprincipal>{ADMIN_GROUP_ID}</uuidprincipal>
        <flags>0</flags>
        <permissionset><allowed>3</allowed><denied>0</denied></permissionset>
      </accessentry>
      <accessentry>
        <uuidprincipal>6b0e7f4c-1d2e-4f3a-9b8c-7d6e5f4a3b2c</uuidprincipal>
        <permissionset><allowed>1</allowed><denied>0</denied></permissionset>
      </accessentry>
    </accesscontrol>
  </file>
</files>"#
    );
    let archive = ArchiveFixture::new(3, &body).file("secure.txt", "s");

    let (outcome, report) = run(&repo, &archive, ImportConfig::default());
    outcome.unwrap();

    let resource = repo.read_resource("/secure.txt").unwrap().unwrap();
    let entries = repo.read_access_control_entries(resource.resource_id).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].principal_id, ADMIN_GROUP_ID);
    assert_eq!(entries[0].allowed, 3);
    assert!(report.contains("principal 6b0e7f4c-1d2e-4f3a-9b8c-7d6e5f4a3b2c not found"));
}

#[test]
fn test_link_becomes_sibling_of_existing_target() {
    let repo = repo();
    repo.create_resource("/a/", ResourceType::Folder, b"", &[])
        .unwrap();
    let real = repo
        .create_resource("/a/real", ResourceType::Plain, b"real content", &[])
        .unwrap();

    let body = r#"<files>
  <file><source>a/link</source><destination>a/link</destination><type>pointer</type></file>
  <file><source>ext</source><destination>ext</destination><type>pointer</type></file>
  <file><source>a/dangling</source><destination>a/dangling</destination><type>pointer</type></file>
</files>"#;
    let archive = ArchiveFixture::new(4, body)
        .file("a/link", "/a/real")
        .file("ext", "http://www.example.org/")
        .file("a/dangling", "/a/missing");

    let (outcome, report) = run(&repo, &archive, ImportConfig::default());
    let outcome = outcome.unwrap();

    let sibling = repo.read_resource("/a/link").unwrap().unwrap();
    assert_eq!(sibling.resource_id, real.resource_id);
    assert_ne!(sibling.structure_id, real.structure_id);
    assert_eq!(sibling.resource_type, ResourceType::Plain);
    assert_eq!(repo.read_file("/a/link").unwrap(), b"real content");

    let literal = repo.read_resource("/ext").unwrap().unwrap();
    assert_eq!(literal.resource_type, ResourceType::Link);
    assert_eq!(repo.read_file("/ext").unwrap(), b"http://www.example.org/");

    assert!(repo.read_resource("/a/dangling").unwrap().is_none());
    assert!(report.contains("link target not found /a/missing"));
    assert!(report.contains("Storing link /a/link"));
    assert!(outcome.written_paths().contains(&"/a/link"));
}

#[test]
fn test_v4_names_dates_and_shared_content() {
    let repo = repo();
    let mut config = ImportConfig::default();
    config
        .principals
        .users
        .insert("root".to_string(), "Admin".to_string());

    let body = format!(
        r#"<files>
  <file>
    <source>one.txt</source>
    <destination>one.txt</destination>
    <type>plain</type>
    <uuidresource>{RESOURCE_ID}</uuidresource>
    <datelastmodified>Mon, 01 Mar 2004 10:00:00 GMT</datelastmodified>
    <userlastmodified>root</userlastmodified>
    <datereleased>1078135200000</datereleased>
    <accesscontrol>
      <accessentry>
        <uuidprincipal>GROUP.Administrators</uuidprincipal>
        <permissionset><allowed>7</allowed><denied>0</denied></permissionset>
      </accessentry>
      <accessentry>
        <uuidprincipal>USER.ghost</uuidprincipal>
        <permissionset><allowed>1</allowed><denied>0</denied></permissionset>
      </accessentry>
    </accesscontrol>
  </file>
  <file>
    <destination>two.txt</destination>
    <type>plain</type>
    <uuidresource>{RESOURCE_ID}</uuidresource>
  </file>
</files>"#
    );
    let archive = ArchiveFixture::new(4, &body).file("one.txt", "shared bytes");

    let (outcome, report) = run(&repo, &archive, config);
    outcome.unwrap();

    let one = repo.read_resource("/one.txt").unwrap().unwrap();
    assert_eq!(one.date_last_modified, 1_078_135_200_000);
    assert_eq!(one.user_last_modified, ADMIN_USER_ID);
    assert_eq!(one.date_released, 1_078_135_200_000);
    assert_eq!(one.date_expired, i64::MAX);

    assert_eq!(repo.read_file("/two.txt").unwrap(), b"shared bytes");

    let entries = repo.read_access_control_entries(one.resource_id).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].principal_id, ADMIN_GROUP_ID);
    assert!(report.contains("principal USER.ghost not found"));
}

#[test]
fn test_v3_legacy_page_converted_in_place() {
    let repo = repo();
    let body = r#"<files>
  <file>
    <source>index.html</source>
    <destination>index.html</destination>
    <type>newpage</type>
    <properties>
      <property><name>locale</name><value>de, en</value></property>
    </properties>
  </file>
</files>"#;
    let archive = ArchiveFixture::new(3, body).file("index.html", "<h1>Hallo</h1>");

    let (outcome, _) = run(&repo, &archive, ImportConfig::default());
    let outcome = outcome.unwrap();

    let page = repo.read_resource("/index.html").unwrap().unwrap();
    assert_eq!(page.resource_type, ResourceType::XmlPage);
    assert_eq!(outcome.imported_pages, vec!["/index.html".to_string()]);

    let parsed = XmlPage::parse(&repo.read_file("/index.html").unwrap()).unwrap();
    assert_eq!(parsed.element("body", "de"), Some("<h1>Hallo</h1>"));
}

const CONTROL_FILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<PAGE>
  <masterTemplate>/system/modules/site/templates/main</masterTemplate>
  <ELEMENTDEF name="body">
    <CLASS>com.example.NewsBody</CLASS>
    <TEMPLATE>/system/bodies/news/index.html</TEMPLATE>
    <PARAMETER name="color">blue</PARAMETER>
  </ELEMENTDEF>
</PAGE>"#;

const TWO_BODY_CONTROL_FILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<PAGE>
  <masterTemplate>/system/modules/site/templates/main</masterTemplate>
  <ELEMENTDEF name="body"><TEMPLATE>/system/bodies/news/a.html</TEMPLATE></ELEMENTDEF>
  <ELEMENTDEF name="side"><TEMPLATE>/system/bodies/news/b.html</TEMPLATE></ELEMENTDEF>
</PAGE>"#;

fn legacy_archive(control: &str) -> ArchiveFixture {
    let body = format!(
        r#"<files>
  {}
  {}
  {}
  <file>
    <source>system/bodies/news/index.html</source>
    <destination>system/bodies/news/index.html</destination>
    <type>plain</type>
    <lastmodified>1078135200000</lastmodified>
  </file>
  {}
  <file>
    <source>news/index.html</source>
    <destination>news/index.html</destination>
    <type>page</type>
    <lastmodified>1078135200000</lastmodified>
  </file>
</files>"#,
        folder("system"),
        folder("system/bodies"),
        folder("system/bodies/news"),
        folder("news")
    );
    ArchiveFixture::new(2, &body)
        .file(
            "system/bodies/news/index.html",
            "<XMLTEMPLATE><TEMPLATE><![CDATA[<p>Hello</p>]]></TEMPLATE></XMLTEMPLATE>",
        )
        .file("news/index.html", control)
}

#[test]
fn test_v2_page_merged_with_body() {
    let repo = repo();
    let (outcome, report) = run(&repo, &legacy_archive(CONTROL_FILE), ImportConfig::default());
    let outcome = outcome.unwrap();

    let page = repo.read_resource("/news/index.html").unwrap().unwrap();
    assert_eq!(page.resource_type, ResourceType::XmlPage);
    assert_eq!(page.date_last_modified, 1_078_135_200_000);

    let parsed = XmlPage::parse(&repo.read_file("/news/index.html").unwrap()).unwrap();
    assert_eq!(parsed.element("body", "en"), Some("<p>Hello</p>"));

    let value = |key: &str| {
        repo.read_property("/news/index.html", key, false)
            .unwrap()
            .and_then(|p| p.value().map(str::to_string))
    };
    assert_eq!(
        value("template").as_deref(),
        Some("/system/modules/site/templates/main")
    );
    assert_eq!(value("templateclass").as_deref(), Some("com.example.NewsBody"));
    assert_eq!(value("color").as_deref(), Some("blue"));

    assert!(repo.read_resource("/system/bodies/news/index.html").unwrap().is_none());
    assert!(repo.read_resource("/system/bodies/news/").unwrap().is_none());
    assert!(repo.read_resource("/system/bodies/").unwrap().is_some());
    assert!(report.contains("Merged /news/index.html"));
    assert!(report.contains("Removed folder /system/bodies/news/"));
    assert_eq!(outcome.imported_pages, vec!["/news/index.html".to_string()]);
}

#[test]
fn test_v2_page_with_two_bodies_stays_plain() {
    let repo = repo();
    let (outcome, report) = run(
        &repo,
        &legacy_archive(TWO_BODY_CONTROL_FILE),
        ImportConfig::default(),
    );
    outcome.unwrap();

    let page = repo.read_resource("/news/index.html").unwrap().unwrap();
    assert_eq!(page.resource_type, ResourceType::Plain);
    assert_eq!(
        repo.read_file("/news/index.html").unwrap(),
        TWO_BODY_CONTROL_FILE.as_bytes()
    );
    assert!(report.contains("not converted"));
    // no merge, so the body and its folder survive
    assert!(repo.read_resource("/system/bodies/news/index.html").unwrap().is_some());
    assert!(repo.read_resource("/system/bodies/news/").unwrap().is_some());
}

#[test]
fn test_v2_without_conversion_keeps_pages() {
    let repo = repo();
    let config = ImportConfig {
        convert_to_xml_page: false,
        ..ImportConfig::default()
    };
    let (outcome, _) = run(&repo, &legacy_archive(CONTROL_FILE), config);
    outcome.unwrap();

    let page = repo.read_resource("/news/index.html").unwrap().unwrap();
    assert_eq!(page.resource_type, ResourceType::Page);
    assert!(repo.read_resource("/system/bodies/news/index.html").unwrap().is_some());
}

#[test]
fn test_conflicts_and_project_resources() {
    let repo = repo();
    let archive = docs_archive();
    let importer = vfsimport::Importer::new(ImportConfig::default()).unwrap();

    assert!(importer
        .conflicting_files(&repo, archive.path(), "/")
        .unwrap()
        .is_empty());
    assert_eq!(
        importer.project_resources(&repo, archive.path(), "/").unwrap(),
        vec!["/".to_string()]
    );

    let (outcome, _) = run(&repo, &archive, ImportConfig::default());
    outcome.unwrap();

    assert_eq!(
        importer.conflicting_files(&repo, archive.path(), "/").unwrap(),
        vec!["/docs/a.txt".to_string(), "/docs/b.txt".to_string()]
    );
    assert_eq!(
        importer.project_resources(&repo, archive.path(), "/").unwrap(),
        vec!["/docs/".to_string()]
    );
}

#[test]
fn test_translation_rules_move_destinations() {
    let repo = repo();
    let config = ImportConfig::parse(
        r#"
[translation]
rules = ["s#^/docs/(.*)#/archive/$1#"]
"#,
    )
    .unwrap();
    repo.create_resource("/archive/", ResourceType::Folder, b"", &[])
        .unwrap();
    let body = r#"<files>
  <file><source>docs/a.txt</source><destination>docs/a.txt</destination><type>plain</type></file>
</files>"#;
    let archive = ArchiveFixture::new(3, body).file("docs/a.txt", "alpha");

    let (outcome, _) = run(&repo, &archive, config);
    assert_eq!(outcome.unwrap().written_paths(), vec!["/archive/a.txt"]);
    assert!(repo.read_resource("/docs/a.txt").unwrap().is_none());
}
