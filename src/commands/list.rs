//! Session listing

use crate::cache::SessionCache;

/// Print the cached sessions with a marker on the last-used store.
pub fn cmd_list(cache: &SessionCache) {
    let sessions = cache.list_sessions();
    if sessions.is_empty() {
        println!("No cached sessions.");
        return;
    }

    println!("Cache file: {}\n", cache.path().display());
    println!("Cached vector stores (per directory/glob key):");
    for entry in sessions {
        let marker = if entry.is_last { "  (last used)" } else { "" };
        println!("- {} -> {}{}", entry.key, entry.store_id, marker);
    }
}
