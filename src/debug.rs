use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::store::EntryStore;

/// Prints what is known about the data file. Works even when the file does
/// not parse, which is when it is most useful.
pub fn debug_store(path: &Path) {
    println!("Account book diagnostics");
    println!("========================");
    println!("Data file: {}", path.display());

    let exists = path.exists();
    println!("Exists: {}", exists);
    if !exists {
        println!("(a missing file is an empty book; it is created on the first save)");
        return;
    }

    if let Ok(metadata) = fs::metadata(path) {
        println!("File size: {} bytes", metadata.len());

        #[cfg(unix)]
        {
            println!("Permissions: {:o}", metadata.permissions().mode() & 0o777);
        }

        if let Ok(modified) = metadata.modified() {
            println!("Modified: {:?}", modified);
        }
    }

    match fs::read(path) {
        Ok(content) => println!("Readable: yes ({} bytes)", content.len()),
        Err(e) => {
            println!("Readable: no ({})", e);
            return;
        }
    }

    match EntryStore::open(path) {
        Ok(store) => println!("Entries: {}", store.len()),
        Err(e) => println!("Parse error: {}", e),
    }
}
