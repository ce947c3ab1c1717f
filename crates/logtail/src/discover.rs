//! 테일 대상 파일 탐색
//!
//! 기동 시 한 번 수행됩니다. 설정된 각 디렉토리의 직계 항목만
//! 나열하고 (하위 디렉토리는 내려가지 않음), 파일 이름에 포함
//! 글롭을 적용한 뒤 제외 글롭으로 다시 걸러냅니다.
//! 없는 디렉토리는 경고만 남기고 건너뜁니다.

use std::path::PathBuf;

use regex::Regex;

use wiregate_core::config::LogTailConfig;

/// 설정을 기준으로 테일 대상 파일 목록을 만듭니다.
///
/// 반환 목록은 경로 기준으로 정렬되어 결정적입니다.
pub fn discover_targets(config: &LogTailConfig) -> Vec<PathBuf> {
    let include = compile_globs(&config.file_patterns);
    let exclude = compile_globs(&config.exclude_patterns);

    let mut targets = Vec::new();
    for dir in &config.directories {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir, error = %e, "failed to read log directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                continue;
            }

            let name = entry.file_name();
            let name = name.to_string_lossy();
            let included = include.iter().any(|re| re.is_match(&name));
            let excluded = exclude.iter().any(|re| re.is_match(&name));
            if included && !excluded {
                targets.push(entry.path());
            }
        }
    }

    targets.sort();
    targets
}

/// 글롭 패턴 목록을 정규식으로 컴파일합니다.
///
/// 컴파일할 수 없는 패턴은 경고를 남기고 무시합니다.
fn compile_globs(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match glob_to_regex(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "ignoring invalid glob pattern");
                None
            }
        })
        .collect()
}

/// 글롭 패턴 하나를 전체 일치 정규식으로 변환합니다.
///
/// `*`는 임의 길이, `?`는 한 글자에 대응하며 그 외 문자는
/// 리터럴로 취급합니다 (경로 구분자 특별 취급 없음 -- 파일
/// 이름에만 적용되므로 충분합니다).
fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated)
}
