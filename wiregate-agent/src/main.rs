use std::process::ExitCode;

use clap::Parser;

use wiregate_agent::cli::AgentCli;
use wiregate_agent::logging;
use wiregate_agent::supervisor::SupervisorBuilder;
use wiregate_core::AgentConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = AgentCli::parse();

    // 루트 권한 확인 -- 원시 캡처를 여는 어떤 리소스보다 먼저 수행
    if !is_root() {
        eprintln!("wiregate-agent must run as root (raw capture requires it)");
        return ExitCode::FAILURE;
    }

    // 설정 로드 + CLI 오버라이드
    let mut config = if cli.config.exists() {
        match AgentConfig::load(&cli.config).await {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load configuration: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        AgentConfig::default()
    };
    cli.apply_overrides(&mut config);

    if let Err(e) = config.validate() {
        eprintln!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }
    if cli.validate {
        println!("configuration OK");
        return ExitCode::SUCCESS;
    }

    // 로깅 초기화
    if let Err(e) = logging::init_tracing(&config.general) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "wiregate-agent starting");

    let mut supervisor = match SupervisorBuilder::new(config).build() {
        Ok(supervisor) => supervisor,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    match supervisor.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "agent terminated with error");
            ExitCode::FAILURE
        }
    }
}

/// 실효 UID가 루트인지 확인합니다.
fn is_root() -> bool {
    // SAFETY: geteuid는 인자가 없고 항상 성공하는 시스템 콜입니다.
    unsafe { libc::geteuid() == 0 }
}
