//! CreateFile outcome matrix on real files

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use w4u_file_api::{DesiredAccess, Disposition, ErrorCode, FileApi, HostStreams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Absent,
    Writable,
    ReadOnly,
}

impl State {
    const ALL: [State; 3] = [State::Absent, State::Writable, State::ReadOnly];

    fn label(self) -> &'static str {
        match self {
            State::Absent => "absent",
            State::Writable => "writable",
            State::ReadOnly => "read-only",
        }
    }
}

const ACCESSES: [(&str, DesiredAccess); 3] = [
    ("read", DesiredAccess::GENERIC_READ),
    ("write", DesiredAccess::GENERIC_WRITE),
    ("all", DesiredAccess::GENERIC_ALL),
];

/// One probed combination
#[derive(Debug, Clone)]
pub struct Row {
    pub disposition: Disposition,
    pub state: State,
    pub access: &'static str,
    pub opened: bool,
    pub last_error: ErrorCode,
}

fn prepare(path: &Path, state: State) -> Result<()> {
    match state {
        State::Absent => {}
        State::Writable => fs::write(path, b"probe").context("Failed to create probe file")?,
        State::ReadOnly => {
            fs::write(path, b"probe").context("Failed to create probe file")?;
            let mut permissions = fs::metadata(path)?.permissions();
            permissions.set_readonly(true);
            fs::set_permissions(path, permissions)?;
        }
    }
    Ok(())
}

fn cleanup(path: &Path) -> Result<()> {
    if let Ok(metadata) = fs::metadata(path) {
        let mut permissions = metadata.permissions();
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)?;
        fs::remove_file(path).context("Failed to remove probe file")?;
    }
    Ok(())
}

/// Probe the given states against every disposition and access
pub fn rows(api: &FileApi<HostStreams>, dir: &Path, states: &[State]) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    for disposition in Disposition::ALL {
        for &state in states {
            for (access_name, access) in ACCESSES {
                let path: PathBuf = dir.join(format!(
                    "w4u-{:?}-{}-{}.bin",
                    disposition,
                    state.label(),
                    access_name
                ));
                prepare(&path, state)?;

                api.set_last_error(ErrorCode::SUCCESS);
                let name = path.to_string_lossy();
                let handle = api.create_file(&name, access, 0, disposition.raw(), 0);
                let row = Row {
                    disposition,
                    state,
                    access: access_name,
                    opened: !handle.is_invalid(),
                    last_error: api.get_last_error(),
                };
                if row.opened {
                    api.close_handle(handle);
                }
                cleanup(&path)?;
                rows.push(row);
            }
        }
    }
    Ok(rows)
}

pub fn run(api: &FileApi<HostStreams>, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    println!(
        "{:<14} {:<10} {:<6} {:<7} last error",
        "disposition", "target", "access", "result"
    );
    for row in rows(api, dir, &State::ALL)? {
        println!(
            "{:<14} {:<10} {:<6} {:<7} {}",
            format!("{:?}", row.disposition),
            row.state.label(),
            row.access,
            if row.opened { "ok" } else { "FAIL" },
            row.last_error
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(rows: &'a [Row], disposition: Disposition, state: State, access: &str) -> &'a Row {
        rows.iter()
            .find(|row| row.disposition == disposition && row.state == state && row.access == access)
            .unwrap()
    }

    #[test]
    fn test_matrix_rows_on_host() {
        let dir = tempfile::tempdir().unwrap();
        let api = FileApi::new(HostStreams::new());
        let rows = rows(&api, dir.path(), &[State::Absent, State::Writable]).unwrap();
        assert_eq!(rows.len(), 4 * 2 * 3);

        let row = find(&rows, Disposition::OpenExisting, State::Absent, "read");
        assert!(!row.opened);
        assert_eq!(row.last_error, ErrorCode::FILE_NOT_FOUND);

        let row = find(&rows, Disposition::CreateNew, State::Writable, "write");
        assert!(!row.opened);
        assert_eq!(row.last_error, ErrorCode::FILE_EXISTS);

        let row = find(&rows, Disposition::OpenAlways, State::Writable, "read");
        assert!(row.opened);
        assert_eq!(row.last_error, ErrorCode::ALREADY_EXISTS);

        let row = find(&rows, Disposition::CreateAlways, State::Writable, "all");
        assert!(!row.opened);
        assert_eq!(row.last_error, ErrorCode::ACCESS_DENIED);

        // Nothing is left behind
        assert_eq!(api.open_handles(), 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
