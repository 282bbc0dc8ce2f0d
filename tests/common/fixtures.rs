//! Dump fixtures and compressed content generators

use std::io::Write;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Small XML document standing in for a dump file
pub const PAGES_XML: &str = r#"<mediawiki xmlns="http://www.mediawiki.org/xml/export-0.10/">
  <page>
    <title>Main Page</title>
    <ns>0</ns>
    <id>1</id>
    <revision>
      <id>100</id>
      <text>Welcome to the wiki.</text>
    </revision>
  </page>
</mediawiki>
"#;

/// Second dump part, distinct from [`PAGES_XML`]
pub const PAGES_XML_PART2: &str = r#"<mediawiki xmlns="http://www.mediawiki.org/xml/export-0.10/">
  <page>
    <title>Second Page</title>
    <ns>0</ns>
    <id>2</id>
  </page>
</mediawiki>
"#;

/// Hex SHA-1 of `bytes`
pub fn sha1_hex(bytes: &[u8]) -> String {
    use sha1::{Digest, Sha1};
    format!("{:x}", Sha1::digest(bytes))
}

/// Hex MD5 of `bytes`
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// gzip-compress `bytes`
pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// bzip2-compress `bytes`
pub fn bzip2(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = ::bzip2::write::BzEncoder::new(Vec::new(), ::bzip2::Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// Build a 7z archive holding `entries` and return its bytes
///
/// `scratch` is used for the entry sources and the archive itself; both are
/// removed before returning.
pub fn seven_zip(scratch: &Path, entries: &[(&str, &str)]) -> Vec<u8> {
    let source = scratch.join("7z-src");
    std::fs::create_dir_all(&source).unwrap();
    let archive = scratch.join("fixture.7z");

    let mut writer = sevenz_rust::SevenZWriter::create(&archive).unwrap();
    for (name, content) in entries {
        let file = source.join(name);
        std::fs::write(&file, content).unwrap();
        writer
            .push_archive_entry(
                sevenz_rust::SevenZArchiveEntry::from_path(&file, name.to_string()),
                Some(std::fs::File::open(&file).unwrap()),
            )
            .unwrap();
    }
    writer.finish().unwrap();

    let bytes = std::fs::read(&archive).unwrap();
    std::fs::remove_dir_all(&source).unwrap();
    std::fs::remove_file(&archive).unwrap();
    bytes
}

/// Serve `body` at `route` with status 200
pub async fn mount_body(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Serve `body` at `route`, asserting exactly `times` requests on drop
pub async fn mount_body_expecting(server: &MockServer, route: &str, body: Vec<u8>, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(times)
        .mount(server)
        .await;
}
