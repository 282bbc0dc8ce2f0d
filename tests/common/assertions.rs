//! Custom test assertions for integration tests

use std::io::Read;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use wikidump_dl::{DumpStream, ResourceStream};

/// Names of the files currently in `dir`, sorted
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Assert that no spool file is left in `dir`
pub fn assert_spool_empty(dir: &Path) {
    let left = dir_entries(dir);
    assert!(left.is_empty(), "spool files left behind: {:?}", left);
}

/// Read a stream to the end on a blocking thread, close it, and return its text
pub async fn read_and_close(stream: DumpStream) -> String {
    tokio::task::spawn_blocking(move || {
        let mut stream = stream;
        let mut content = String::new();
        stream.read_to_string(&mut content).unwrap();
        stream.close().unwrap();
        content
    })
    .await
    .unwrap()
}

/// Pull the next stream and fail the test unless one is returned
pub async fn expect_next(resources: &mut ResourceStream, cancel: &CancellationToken) -> DumpStream {
    match resources.next(cancel).await {
        Ok(Some(stream)) => stream,
        Ok(None) => panic!("resource stream ended early"),
        Err(e) => panic!("resource stream failed: {e}"),
    }
}
