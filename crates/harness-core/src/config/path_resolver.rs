use std::path::{Path, PathBuf};

/// Resolves paths written in a run file relative to that file's directory.
#[derive(Clone)]
pub struct PathResolver {
    base_dir: PathBuf,
}

impl PathResolver {
    pub fn new(config_path: &Path) -> Self {
        let base_dir = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        Self { base_dir }
    }

    pub fn resolve_opt(&self, p: &mut Option<PathBuf>) {
        let Some(pb) = p.as_mut() else { return };
        if pb.as_os_str().is_empty() || pb.is_absolute() {
            return;
        }
        *pb = self.join_clean(pb);
    }

    fn join_clean(&self, rel: &Path) -> PathBuf {
        let joined = self.base_dir.join(rel);

        let mut out = PathBuf::new();
        for c in joined.components() {
            use std::path::Component::*;
            match c {
                CurDir => {}
                ParentDir => match out.components().next_back() {
                    Some(Normal(_)) => {
                        out.pop();
                    }
                    Some(RootDir) | Some(Prefix(_)) => {}
                    // nothing left to pop: keep the leading ".."
                    _ => out.push(".."),
                },
                RootDir | Prefix(_) | Normal(_) => out.push(c.as_os_str()),
            }
        }
        out
    }
}
