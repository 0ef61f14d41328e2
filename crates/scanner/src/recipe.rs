//! 스캔 레시피 합성과 빌드 컨텍스트 생성
//!
//! 대상 이미지 위에 스캐닝 에이전트를 얹는 2단계 Dockerfile을 만들고,
//! 이를 단일 엔트리 tar 아카이브로 포장합니다.
//!
//! ```text
//! FROM <scanner_image> as scanner
//!
//! FROM <target> as <build_tag>
//! USER root
//! COPY --from=scanner /microscanner /microscanner
//! ARG token
//! RUN /microscanner --continue-on-failure --no-verify ${token} > /scan.json
//! ENTRYPOINT []
//! CMD cat /scan.json
//! ```

use std::collections::HashMap;
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::engine::BuildOptions;

/// 빌드 컨텍스트 안의 레시피 파일 이름
pub const RECIPE_FILE_NAME: &str = "Dockerfile";

/// 에이전트 토큰을 받는 빌드 인자 이름
pub const TOKEN_BUILD_ARG: &str = "token";

/// 에이전트 바이너리 경로 (스캐너 이미지와 빌드 이미지 모두 동일)
const AGENT_PATH: &str = "/microscanner";

/// 에이전트 출력이 저장되는 파일
const REPORT_PATH: &str = "/scan.json";

/// 대상 이미지 하나에 대한 스캔 레시피
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecipe {
    image: String,
    scanner_image: String,
    build_tag: String,
}

impl ScanRecipe {
    /// 레시피를 생성합니다.
    ///
    /// 이미지 참조에 공백이나 제어 문자가 있으면 레시피에 명령을
    /// 끼워 넣을 수 있으므로 거부합니다.
    pub fn new(image: &str, scanner_image: &str, build_tag: &str) -> Result<Self, String> {
        for (field, value) in [
            ("image", image),
            ("scanner image", scanner_image),
            ("build tag", build_tag),
        ] {
            if value.is_empty() {
                return Err(format!("{field} reference is empty"));
            }
            if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(format!(
                    "{field} reference {value:?} contains whitespace or control characters"
                ));
            }
        }

        Ok(Self {
            image: image.to_owned(),
            scanner_image: scanner_image.to_owned(),
            build_tag: build_tag.to_owned(),
        })
    }

    /// 스캔 대상 이미지
    pub fn image(&self) -> &str {
        &self.image
    }

    /// 빌드될 임시 이미지 태그
    pub fn build_tag(&self) -> &str {
        &self.build_tag
    }

    /// Dockerfile 텍스트를 렌더링합니다.
    pub fn render(&self) -> String {
        format!(
            "FROM {scanner} as scanner\n\
             \n\
             FROM {image} as {tag}\n\
             USER root\n\
             COPY --from=scanner {agent} {agent}\n\
             ARG {arg}\n\
             RUN {agent} --continue-on-failure --no-verify ${{{arg}}} > {report}\n\
             ENTRYPOINT []\n\
             CMD cat {report}\n",
            scanner = self.scanner_image,
            image = self.image,
            tag = self.build_tag,
            agent = AGENT_PATH,
            arg = TOKEN_BUILD_ARG,
            report = REPORT_PATH,
        )
    }

    /// 이 레시피를 빌드할 때의 엔진 옵션을 만듭니다.
    ///
    /// 토큰은 빌드 인자로만 전달됩니다.
    pub fn build_options(&self, token: &str, pull_parent: bool) -> BuildOptions {
        let mut build_args = HashMap::with_capacity(1);
        build_args.insert(TOKEN_BUILD_ARG.to_owned(), token.to_owned());
        BuildOptions {
            dockerfile: RECIPE_FILE_NAME.to_owned(),
            tag: self.build_tag.clone(),
            pull_parent,
            no_cache: true,
            suppress_output: true,
            build_args,
        }
    }
}

/// 동시에 실행되는 파이프라인끼리 겹치지 않는 빌드 태그를 생성합니다.
///
/// `{prefix}-{unix_nanos}-{uuid 앞 8자}` 형식입니다.
pub fn unique_scan_tag(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{nanos}-{}", &nonce[..8])
}

/// 레시피를 `Dockerfile` 하나만 담은 tar 아카이브로 포장합니다.
pub fn build_context(recipe: &ScanRecipe) -> io::Result<Bytes> {
    let rendered = recipe.render();
    let data = rendered.as_bytes();

    let mut header = tar::Header::new_gnu();
    header.set_path(RECIPE_FILE_NAME)?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();

    let mut builder = tar::Builder::new(Vec::with_capacity(data.len() + 1024));
    builder.append(&header, data)?;
    let archive = builder.into_inner()?;
    Ok(Bytes::from(archive))
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    fn sample() -> ScanRecipe {
        ScanRecipe::new(
            "alpine:3.19",
            "ehazlett/microscanner:latest",
            "scan-1700000000000000000-deadbeef",
        )
        .unwrap()
    }

    #[test]
    fn render_produces_two_stage_recipe() {
        let expected = "FROM ehazlett/microscanner:latest as scanner\n\
                        \n\
                        FROM alpine:3.19 as scan-1700000000000000000-deadbeef\n\
                        USER root\n\
                        COPY --from=scanner /microscanner /microscanner\n\
                        ARG token\n\
                        RUN /microscanner --continue-on-failure --no-verify ${token} > /scan.json\n\
                        ENTRYPOINT []\n\
                        CMD cat /scan.json\n";
        assert_eq!(sample().render(), expected);
    }

    #[test]
    fn render_never_contains_token_value() {
        let recipe = sample();
        let options = recipe.build_options("s3cr3t", true);
        assert!(!recipe.render().contains("s3cr3t"));
        assert_eq!(options.build_args.get("token").map(String::as_str), Some("s3cr3t"));
    }

    #[test]
    fn build_options_are_no_cache_and_quiet() {
        let options = sample().build_options("t", false);
        assert_eq!(options.dockerfile, "Dockerfile");
        assert_eq!(options.tag, "scan-1700000000000000000-deadbeef");
        assert!(options.no_cache);
        assert!(options.suppress_output);
        assert!(!options.pull_parent);
    }

    #[test]
    fn new_rejects_injection_attempts() {
        assert!(ScanRecipe::new("alpine\nRUN rm -rf /", "scanner", "scan-1").is_err());
        assert!(ScanRecipe::new("alpine latest", "scanner", "scan-1").is_err());
        assert!(ScanRecipe::new("", "scanner", "scan-1").is_err());
        assert!(ScanRecipe::new("alpine", "scanner", "").is_err());
    }

    #[test]
    fn unique_scan_tag_has_prefix_and_differs() {
        let a = unique_scan_tag("scan");
        let b = unique_scan_tag("scan");
        assert!(a.starts_with("scan-"));
        assert_ne!(a, b);
        assert_eq!(a.rsplit('-').next().map(str::len), Some(8));
    }

    #[test]
    fn unique_scan_tags_are_distinct_under_concurrency() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| unique_scan_tag("scan")).collect::<Vec<_>>()))
            .collect();
        let mut all = std::collections::HashSet::new();
        for h in handles {
            for tag in h.join().unwrap() {
                assert!(all.insert(tag));
            }
        }
        assert_eq!(all.len(), 800);
    }

    #[test]
    fn build_context_contains_only_the_recipe() {
        let recipe = sample();
        let context = build_context(&recipe).unwrap();

        let mut archive = tar::Archive::new(&context[..]);
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str(), Some("Dockerfile"));
        assert_eq!(entry.header().mode().unwrap(), 0o644);

        let mut body = String::new();
        entry.read_to_string(&mut body).unwrap();
        assert_eq!(body, recipe.render());
        drop(entry);
        assert!(entries.next().is_none());
    }
}
