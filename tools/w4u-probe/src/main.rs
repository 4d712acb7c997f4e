//! w4u-probe - exercise the W4U file API on the host filesystem
//!
//! Commands:
//! - `w4u-probe matrix --dir <DIR>` - print the CreateFile outcome matrix
//! - `w4u-probe cat <PATH>` - read a file through ReadFile
//! - `w4u-probe copy <SRC> <DST>` - copy through ReadFile/WriteFile
//! - `w4u-probe seek <PATH> <OFFSET>` - move the file pointer and report it

mod matrix;

use std::io::Write;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use w4u_file_api::{
    DesiredAccess, Disposition, ErrorCode, FileApi, FileApiConfig, Handle, HostStreams,
    MoveMethod, INVALID_SET_FILE_POINTER,
};

const CHUNK: usize = 4096;

#[derive(Parser, Debug)]
#[command(name = "w4u-probe")]
#[command(version)]
#[command(about = "Exercise the W4U Win32 file API emulation", long_about = None)]
struct Cli {
    /// Handle table capacity
    #[arg(long, default_value_t = FileApiConfig::default().capacity)]
    capacity: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print success and last error for every disposition and access
    Matrix {
        /// Scratch directory for the probe files
        #[arg(long)]
        dir: std::path::PathBuf,
    },

    /// Print a file to stdout
    Cat {
        path: String,
    },

    /// Copy SRC to DST (DST is created or truncated)
    Copy {
        src: String,
        dst: String,
    },

    /// Move the file pointer of PATH
    Seek {
        path: String,

        /// Low 32 bits of the distance (or the whole distance without --high)
        #[arg(allow_hyphen_values = true)]
        offset: i32,

        /// High 32 bits of the distance
        #[arg(long, allow_hyphen_values = true)]
        high: Option<i32>,

        #[arg(long, value_enum, default_value_t = Origin::Begin)]
        origin: Origin,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Origin {
    Begin,
    Current,
    End,
}

impl From<Origin> for MoveMethod {
    fn from(origin: Origin) -> Self {
        match origin {
            Origin::Begin => MoveMethod::Begin,
            Origin::Current => MoveMethod::Current,
            Origin::End => MoveMethod::End,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let api = FileApi::with_config(HostStreams::new(), FileApiConfig::with_capacity(cli.capacity));

    match cli.command {
        Commands::Matrix { dir } => matrix::run(&api, &dir)?,
        Commands::Cat { path } => cat(&api, &path)?,
        Commands::Copy { src, dst } => copy(&api, &src, &dst)?,
        Commands::Seek {
            path,
            offset,
            high,
            origin,
        } => seek(&api, &path, offset, high, origin.into())?,
    }

    Ok(())
}

fn open(
    api: &FileApi<HostStreams>,
    path: &str,
    access: DesiredAccess,
    disposition: Disposition,
) -> Result<Handle> {
    let handle = api.create_file(path, access, 0, disposition.raw(), 0);
    if handle.is_invalid() {
        bail!("CreateFile({}) failed: {}", path, api.get_last_error());
    }
    log::debug!("opened {} as {:#x}", path, handle.raw());
    Ok(handle)
}

fn close(api: &FileApi<HostStreams>, handle: Handle) -> Result<()> {
    if !api.close_handle(handle) {
        bail!("CloseHandle failed: {}", api.get_last_error());
    }
    Ok(())
}

fn cat(api: &FileApi<HostStreams>, path: &str) -> Result<()> {
    let handle = open(api, path, DesiredAccess::GENERIC_READ, Disposition::OpenExisting)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut buf = [0u8; CHUNK];

    loop {
        let mut read = 0;
        if !api.read_file(handle, &mut buf, Some(&mut read)) {
            bail!("ReadFile({}) failed: {}", path, api.get_last_error());
        }
        if read == 0 {
            break;
        }
        out.write_all(&buf[..read as usize])
            .context("Failed to write to stdout")?;
    }

    close(api, handle)
}

fn copy(api: &FileApi<HostStreams>, src: &str, dst: &str) -> Result<()> {
    let input = open(api, src, DesiredAccess::GENERIC_READ, Disposition::OpenExisting)?;

    api.set_last_error(ErrorCode::SUCCESS);
    let output = open(api, dst, DesiredAccess::GENERIC_WRITE, Disposition::CreateAlways)?;
    match api.get_last_error() {
        ErrorCode::ALREADY_EXISTS => log::info!("{} exists, truncated", dst),
        ErrorCode::ACCESS_DENIED => log::warn!("{} is read-only, left untouched", dst),
        _ => {}
    }

    let mut buf = [0u8; CHUNK];
    let mut total = 0u64;
    loop {
        let mut read = 0;
        if !api.read_file(input, &mut buf, Some(&mut read)) {
            bail!("ReadFile({}) failed: {}", src, api.get_last_error());
        }
        if read == 0 {
            break;
        }
        let mut written = 0;
        if !api.write_file(output, &buf[..read as usize], Some(&mut written)) {
            bail!("WriteFile({}) failed: {}", dst, api.get_last_error());
        }
        if written != read {
            bail!("WriteFile({}) short write: {} of {}", dst, written, read);
        }
        total += u64::from(written);
    }

    close(api, input)?;
    close(api, output)?;
    log::info!("copied {} bytes from {} to {}", total, src, dst);
    Ok(())
}

fn seek(
    api: &FileApi<HostStreams>,
    path: &str,
    offset: i32,
    high: Option<i32>,
    method: MoveMethod,
) -> Result<()> {
    let handle = open(api, path, DesiredAccess::GENERIC_READ, Disposition::OpenExisting)?;

    api.set_last_error(ErrorCode::SUCCESS);
    let mut high_part = high.unwrap_or(0);
    let low = api.set_file_pointer(
        handle,
        offset,
        high.is_some().then_some(&mut high_part),
        method,
    );

    let error = api.get_last_error();
    if low == INVALID_SET_FILE_POINTER && error != ErrorCode::SUCCESS {
        println!("SetFilePointer failed: {}", error);
    } else if high.is_some() {
        println!("position {:#x}:{:08x}", high_part, low);
    } else {
        println!("position {}", low);
    }

    close(api, handle)
}
