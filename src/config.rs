use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppResult, ConfigError};

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 成绩查询页地址
    pub result_url: String,
    /// 浏览器调试端口（设置后连接已有浏览器，否则启动无头浏览器）
    pub browser_debug_port: Option<u16>,
    /// 无头模式下使用的浏览器可执行文件
    pub chrome_executable: Option<PathBuf>,
    /// 学生名单文件
    pub roster_file: String,
    /// 上传名单存放目录
    pub upload_dir: PathBuf,
    /// 成绩报告输出目录
    pub output_dir: PathBuf,
    /// 过期记录文件
    pub expiry_file: PathBuf,
    /// 科目信息 TOML 文件（可选）
    pub subject_info_file: Option<String>,
    /// 班级名称（用于报告文件名）
    pub class_name: String,
    /// 学期（用于报告文件名）
    pub semester: String,
    /// 每处理多少个学生保存一次快照
    pub snapshot_every: usize,
    /// 上传名单保留时间
    pub upload_ttl: Duration,
    /// 成绩报告保留时间
    pub result_ttl: Duration,
    /// 过期清理间隔
    pub sweep_interval: Duration,
    /// 进度输出间隔
    pub status_interval: Duration,
    /// 页面控件等待时间
    pub element_timeout: Duration,
    /// 确认按钮探测时间
    pub confirm_timeout: Duration,
    /// 结果内容等待时间
    pub content_timeout: Duration,
    /// 结果内容稳定等待时间
    pub settle_delay: Duration,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            result_url: "https://result.mdurtk.in/postexam/result.aspx".to_string(),
            browser_debug_port: None,
            chrome_executable: None,
            roster_file: "student_data.csv".to_string(),
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            expiry_file: PathBuf::from(".expiries.json"),
            subject_info_file: None,
            class_name: "Class".to_string(),
            semester: "Semester".to_string(),
            snapshot_every: 5,
            upload_ttl: Duration::from_secs(10 * 60),
            result_ttl: Duration::from_secs(20 * 60),
            sweep_interval: Duration::from_secs(60),
            status_interval: Duration::from_secs(5),
            element_timeout: Duration::from_secs(10),
            confirm_timeout: Duration::from_secs(5),
            content_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_secs(3),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            result_url: std::env::var("RESULT_URL").unwrap_or(default.result_url),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().map(PathBuf::from),
            roster_file: std::env::var("ROSTER_FILE").unwrap_or(default.roster_file),
            upload_dir: std::env::var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(default.upload_dir),
            output_dir: std::env::var("OUTPUT_DIR").map(PathBuf::from).unwrap_or(default.output_dir),
            expiry_file: std::env::var("EXPIRY_FILE").map(PathBuf::from).unwrap_or(default.expiry_file),
            subject_info_file: std::env::var("SUBJECT_INFO_FILE").ok(),
            class_name: std::env::var("CLASS_NAME").unwrap_or(default.class_name),
            semester: std::env::var("SEMESTER").unwrap_or(default.semester),
            snapshot_every: std::env::var("SNAPSHOT_EVERY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.snapshot_every),
            upload_ttl: secs_from_env("UPLOAD_TTL_SECS").unwrap_or(default.upload_ttl),
            result_ttl: secs_from_env("RESULT_TTL_SECS").unwrap_or(default.result_ttl),
            sweep_interval: secs_from_env("SWEEP_INTERVAL_SECS").unwrap_or(default.sweep_interval),
            status_interval: secs_from_env("STATUS_INTERVAL_SECS").unwrap_or(default.status_interval),
            element_timeout: secs_from_env("ELEMENT_TIMEOUT_SECS").unwrap_or(default.element_timeout),
            confirm_timeout: secs_from_env("CONFIRM_TIMEOUT_SECS").unwrap_or(default.confirm_timeout),
            content_timeout: secs_from_env("CONTENT_TIMEOUT_SECS").unwrap_or(default.content_timeout),
            settle_delay: secs_from_env("SETTLE_DELAY_SECS").unwrap_or(default.settle_delay),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> AppResult<()> {
        if self.snapshot_every == 0 {
            return Err(invalid("SNAPSHOT_EVERY", "必须大于 0").into());
        }
        if self.sweep_interval.is_zero() {
            return Err(invalid("SWEEP_INTERVAL_SECS", "必须大于 0").into());
        }
        if self.status_interval.is_zero() {
            return Err(invalid("STATUS_INTERVAL_SECS", "必须大于 0").into());
        }
        Ok(())
    }
}

fn secs_from_env(name: &str) -> Option<Duration> {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).map(Duration::from_secs)
}

fn invalid(name: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
