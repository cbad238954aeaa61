use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// Case-insensitive path resolution for one scene's working directory.
/// Scene files authored on case-insensitive file systems reference assets
/// with whatever casing the author typed; this indexes every regular file
/// under the root by its lower-cased path so those references still resolve.
pub struct FileSystemMappings {
    root: PathBuf,
    mappings: HashMap<u64, PathBuf>,
}

fn normalise(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn key_for(path: &Path) -> u64 {
    let lowered = path
        .to_string_lossy()
        .replace('\\', std::path::MAIN_SEPARATOR_STR)
        .to_lowercase();
    let mut hasher = DefaultHasher::new();
    lowered.hash(&mut hasher);
    hasher.finish()
}

impl FileSystemMappings {
    pub fn new(root: &Path) -> Self {
        let mut mappings = HashMap::new();
        Self::populate_directory(root, root, &mut mappings);
        Self {
            root: root.to_path_buf(),
            mappings,
        }
    }

    fn populate_directory(root: &Path, directory: &Path, mappings: &mut HashMap<u64, PathBuf>) {
        let Ok(entries) = std::fs::read_dir(directory) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                mappings.insert(key_for(&normalise(&path)), relative);
            } else if path.is_dir() {
                Self::populate_directory(root, &path, mappings);
            }
        }
    }

    /// Map an incoming path, relative or absolute and in any casing, onto
    /// an indexed file. Unindexed paths pass through unchanged.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let absolute = if path.is_relative() {
            self.root.join(path)
        } else {
            path.to_path_buf()
        };
        let normalised = normalise(&absolute);

        match self.mappings.get(&key_for(&normalised)) {
            Some(relative) => self.root.join(relative),
            None => normalised,
        }
    }
}
