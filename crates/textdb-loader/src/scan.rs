//! Directory walk: one Branch per directory, one child per document.

use crate::config::LoaderConfig;
use crate::document::{read_document, read_validity};
use crate::LoadError;
use std::path::{Path, PathBuf};
use textdb_core::{strip_document_suffix, Branch, Node, Vars};
use walkdir::WalkDir;

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Store `node` under `key`, merging with a same-named entry already present
/// (a `dir1.json` file next to a `dir1/` directory).
fn insert_merged(branch: &mut Branch, key: &str, node: Node) {
    let mut incoming = Branch::new();
    incoming.insert(key, node);
    branch.merge(incoming);
}

/// Build the Branch for `root` and everything below it.
pub(crate) fn load_root(root: &Path, config: &LoaderConfig) -> Result<Branch, LoadError> {
    if !root.is_dir() {
        return Err(LoadError::NotADirectory(root.to_path_buf()));
    }
    let vars = Vars::from([("_".to_string(), root.display().to_string())]);
    let branch = load_dir(root, config, &vars)?;
    tracing::info!(root = %root.display(), entries = branch.len(), "loaded database root");
    Ok(branch)
}

fn load_dir(dir: &Path, config: &LoaderConfig, vars: &Vars) -> Result<Branch, LoadError> {
    let mut branch = Branch::new();
    let mut validity_files: Vec<PathBuf> = Vec::new();

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(config.follow_links)
        .sort_by_file_name();

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = entry.file_name().to_str() else {
            tracing::warn!(path = %path.display(), "skipping non UTF-8 file name");
            continue;
        };
        if is_hidden(name) {
            continue;
        }

        if entry.file_type().is_dir() {
            let child = load_dir(path, config, vars)?;
            insert_merged(&mut branch, name, Node::Branch(child));
        } else if config.is_validity_file(path) {
            validity_files.push(path.to_path_buf());
        } else if config.is_document(path) {
            match load_document(path, config, vars) {
                Ok(node) => insert_merged(&mut branch, strip_document_suffix(name), node),
                Err(err) if !config.strict => {
                    tracing::warn!(path = %path.display(), error = %err, "could not load document, skipping");
                }
                Err(err) => return Err(err),
            }
        } else {
            tracing::trace!(path = %path.display(), "ignoring file");
        }
    }

    match validity_files.as_slice() {
        [] => {}
        [file] => {
            let log = read_validity(file)?;
            for target in log.dangling_targets(&branch) {
                tracing::warn!(
                    validity = %file.display(),
                    key = target,
                    "validity target has no matching document"
                );
            }
            branch.set_validity(log);
        }
        _ => {
            return Err(LoadError::MultipleValidityFiles {
                dir: dir.to_path_buf(),
                files: validity_files,
            })
        }
    }

    Ok(branch)
}

fn load_document(path: &Path, config: &LoaderConfig, vars: &Vars) -> Result<Node, LoadError> {
    let mut node = read_document(path)?;
    if config.substitute_root {
        node.subst_vars(vars, true).map_err(|source| LoadError::Subst {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(node)
}
