use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("serialpose {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: serialpose");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("SERIALPOSE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "frame_buffer: default={} range={}..={}",
        serialpose_frame::DEFAULT_CAPACITY,
        serialpose_frame::MIN_CAPACITY,
        serialpose_frame::MAX_CAPACITY
    );
    println!(
        "features: receiver={}, cli=true",
        cfg!(feature = "receiver")
    );

    Ok(SUCCESS)
}
