//! # 剪贴板图片提取工具 — 应用入口
//!
//! 本文件仅负责命令行解析、日志初始化与组件装配。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。
//!
//! 运行后从标准输入读取命令：`s` 中止当前处理，`p` 立即处理一次，`q` 退出。

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use clipboard_image_extractor::charset::charset_report;
use clipboard_image_extractor::clipboard::{
    ClipboardService, ServiceConfig, ServiceError, SystemClipboard,
};
use clipboard_image_extractor::error::AppError;
use clipboard_image_extractor::extractor::{ExtractorConfig, ImageExtractor};
use clipboard_image_extractor::progress::ProgressModel;
use clipboard_image_extractor::settings::{self, JsonSettingsFile, SettingsStore};

/// 监听剪贴板中的 Base64 图片并保存到磁盘
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// 设置文件路径
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// 图片输出目录（覆盖设置文件中的值）
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// 打印内置字符集的兼容性报表后退出
    #[arg(long)]
    charset_report: bool,

    /// 报表以 JSON 输出
    #[arg(long, requires = "charset_report")]
    json: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        log::error!("❌ {}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    if cli.charset_report {
        return print_charset_report(cli.json);
    }

    let store: Arc<dyn SettingsStore> = Arc::new(JsonSettingsFile::open(&cli.settings)?);
    let progress = Arc::new(ProgressModel::new(PathBuf::from("images"), 1));
    settings::bind_progress(&progress, Arc::clone(&store));
    if let Some(dir) = cli.output_dir {
        if !progress.try_set_output_dir(&dir) {
            log::warn!("⚠️ 命令行指定的输出目录不可用，继续使用 {}", progress.output_dir().get().display());
        }
    }

    progress.status().subscribe(|line| println!("{line}"));
    progress.status_bar().subscribe(|line| println!("  {line}"));

    let extractor = Arc::new(ImageExtractor::new(ExtractorConfig::default(), Arc::clone(&progress))?);
    let service = ClipboardService::with_progress(
        Arc::new(SystemClipboard::new()),
        ServiceConfig::default(),
        Arc::clone(&progress),
    );
    service.register_handler(ImageExtractor::supported_formats(), extractor, false)?;

    if !service.start() {
        return Err(ServiceError::IllegalState("剪贴板服务启动失败".to_string()).into());
    }
    log::info!(
        "📁 图片将保存到 {}，下一个序号 {}",
        progress.output_dir().get().display(),
        progress.sequence().get()
    );

    for line in io::stdin().lock().lines() {
        match line?.trim() {
            "s" => {
                if !service.request_stop_processing() {
                    println!("当前没有正在进行的处理");
                }
            }
            "p" => {
                service.request_process_now();
            }
            "q" => break,
            "" => {}
            other => println!("未知命令: {other}（s 中止 / p 立即处理 / q 退出）"),
        }
    }

    service.request_stop();
    service.wait_for_shutdown();
    log::info!("👋 已退出");
    Ok(())
}

fn print_charset_report(json: bool) -> Result<(), AppError> {
    let report = charset_report();
    if json {
        let content = serde_json::to_string_pretty(&report).map_err(io::Error::from)?;
        println!("{content}");
        return Ok(());
    }

    println!(
        "{:<12} {:>6} {:<14} {:<8} {:<8}",
        "charset", "bytes", "byte order", "base64", "ascii"
    );
    for row in report {
        println!(
            "{:<12} {:>6} {:<14} {:<8} {:<8}",
            row.name,
            row.bytes_per_unit,
            row.byte_order.to_string(),
            row.base64_congruent,
            row.ascii_byte_compatible
        );
    }
    Ok(())
}
