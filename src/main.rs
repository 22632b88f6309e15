use std::process::ExitCode;

use clap::Parser;

use linkstash::cli::Cli;
use linkstash::config::StaticConfig;

#[cfg(feature = "server")]
fn run_server_mode(config: StaticConfig) -> ExitCode {
    // 日志系统在配置加载后初始化，guard 需要存活到进程结束
    let _guard = match linkstash::system::init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e.format_colored());
            return ExitCode::FAILURE;
        }
    };

    let result =
        actix_web::rt::System::new().block_on(linkstash::runtime::modes::run_server(&config));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Server exited with error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = StaticConfig::load(cli.config.as_deref());

    if cli.is_server_mode() {
        #[cfg(feature = "server")]
        return run_server_mode(config);

        #[cfg(not(feature = "server"))]
        {
            eprintln!("Server mode is not enabled in this build");
            return ExitCode::FAILURE;
        }
    }

    #[cfg(feature = "cli")]
    if let Some(cmd) = cli.command {
        let code = linkstash::runtime::modes::run_cli(cmd, &config);
        return ExitCode::from(code as u8);
    }

    eprintln!("No command given");
    ExitCode::FAILURE
}
