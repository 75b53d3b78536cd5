use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("fieldlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: fieldlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("FIELDLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: session={}, pool={}, cli=true",
        cfg!(feature = "session"),
        cfg!(feature = "pool")
    );
    println!(
        "defaults: connect_timeout={}s, listen_backlog={}, pool_size={}",
        fieldlink_session::DEFAULT_CONNECT_TIMEOUT.as_secs(),
        fieldlink_session::DEFAULT_LISTEN_BACKLOG,
        fieldlink_pool::DEFAULT_POOL_SIZE
    );

    Ok(SUCCESS)
}
