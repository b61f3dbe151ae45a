use crate::error::{UiError, UiResult};
use crate::types::{Point, UiNode, WindowInfo};
use async_trait::async_trait;
use std::ffi::OsStr;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::debug;
use veildesk_stealth::{pointer_path, JitterConfig, PathStep};

/// Accessibility seam: window enumeration, tree dumps, and control
/// actions for one isolated surface. Concrete providers wrap the
/// platform accessibility interface; tests inject mocks.
#[async_trait]
pub trait AccessibilityProvider: Send + Sync {
    async fn list_windows(&self) -> UiResult<Vec<WindowInfo>>;

    /// Dump the subtree of a window, bounded by `max_items`. Off-screen
    /// nodes are excluded unless `include_offscreen` is set.
    async fn dump_tree(
        &self,
        window_id: &str,
        max_items: usize,
        include_offscreen: bool,
    ) -> UiResult<Vec<UiNode>>;

    /// Fire the default action of a control (e.g. press a button).
    async fn invoke(&self, node_id: &str) -> UiResult<()>;

    async fn set_value(&self, node_id: &str, value: &str) -> UiResult<()>;
}

/// Pointer seam: synthetic clicks on the isolated surface. Separate
/// from accessibility so the jitter layer can drive raw motion.
#[async_trait]
pub trait PointerDriver: Send + Sync {
    async fn move_to(&self, point: Point) -> UiResult<()>;
    async fn click(&self, point: Point, button: &str) -> UiResult<()>;
}

async fn command_exists(command: &str) -> bool {
    Command::new("which")
        .arg(command)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

async fn run_checked<I>(display: &str, command: &str, args: I) -> UiResult<()>
where
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    let output = Command::new(command)
        .args(args)
        .env("DISPLAY", display)
        .output()
        .await?;
    if output.status.success() {
        return Ok(());
    }
    Err(UiError::OperationFailed(
        String::from_utf8_lossy(&output.stderr).to_string(),
    ))
}

fn parse_button(button: &str) -> UiResult<&'static str> {
    match button.to_lowercase().as_str() {
        "left" => Ok("1"),
        "middle" => Ok("2"),
        "right" => Ok("3"),
        other => Err(UiError::InvalidArgument(format!(
            "unsupported mouse button: {other}"
        ))),
    }
}

/// xdotool-backed pointer bound to one hidden display. Motion walks a
/// humanized curve instead of teleporting; the whole path runs as one
/// chained xdotool invocation.
pub struct XdoPointer {
    display: String,
    jitter: JitterConfig,
    last: Mutex<Point>,
}

impl XdoPointer {
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            jitter: JitterConfig::default(),
            last: Mutex::new(Point { x: 0, y: 0 }),
        }
    }

    pub fn with_jitter(mut self, jitter: JitterConfig) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Chained `mousemove x y sleep s` arguments for one pointer path.
pub(crate) fn motion_args(path: &[PathStep]) -> Vec<String> {
    let mut args = Vec::with_capacity(path.len() * 5);
    for step in path {
        args.push("mousemove".to_string());
        args.push(format!("{}", step.x.round().max(0.0) as i64));
        args.push(format!("{}", step.y.round().max(0.0) as i64));
        args.push("sleep".to_string());
        args.push(format!("{:.3}", step.delay_ms as f64 / 1000.0));
    }
    args
}

#[async_trait]
impl PointerDriver for XdoPointer {
    async fn move_to(&self, point: Point) -> UiResult<()> {
        if point.x < 0 || point.y < 0 {
            return Err(UiError::InvalidArgument(
                "coordinates must be >= 0".to_string(),
            ));
        }
        if !command_exists("xdotool").await {
            return Err(UiError::OperationFailed(
                "xdotool not found (install 'xdotool' package)".to_string(),
            ));
        }

        // Hold the position lock across the move so interleaved calls
        // cannot start a path from a stale origin.
        let mut last = self.last.lock().await;
        let path = pointer_path(
            (last.x as f64, last.y as f64),
            (point.x as f64, point.y as f64),
            &self.jitter,
        );
        debug!(
            "Pointer move ({}, {}) -> ({}, {}) in {} steps on {}",
            last.x,
            last.y,
            point.x,
            point.y,
            path.len(),
            self.display
        );
        run_checked(&self.display, "xdotool", motion_args(&path)).await?;
        *last = point;
        Ok(())
    }

    async fn click(&self, point: Point, button: &str) -> UiResult<()> {
        let code = parse_button(button)?;
        self.move_to(point).await?;
        // Let the compositor settle the cursor before the press lands.
        sleep(Duration::from_millis(30)).await;
        run_checked(&self.display, "xdotool", &["click", code]).await
    }
}

/// Window enumeration via wmctrl on one hidden display. Tree-level
/// accessibility needs a platform bridge (AT-SPI or UIA); callers
/// plug one in through `AccessibilityProvider`, and this type covers
/// the window tier only.
pub struct WmctrlWindows {
    display: String,
}

impl WmctrlWindows {
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
        }
    }
}

pub(crate) fn parse_wmctrl_list(output: &str) -> Vec<WindowInfo> {
    // wmctrl -lx: <id> <desktop> <wm_class> <host> <title...>
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let id = parts.next()?.to_string();
            let _desktop = parts.next()?;
            let wm_class = parts.next()?.to_string();
            let _host = parts.next()?;
            let title = parts.collect::<Vec<&str>>().join(" ");
            if title.is_empty() {
                return None;
            }
            let app_name = wm_class
                .split('.')
                .next_back()
                .unwrap_or(&wm_class)
                .to_string();
            Some(WindowInfo { id, title, app_name })
        })
        .collect()
}

#[async_trait]
impl AccessibilityProvider for WmctrlWindows {
    async fn list_windows(&self) -> UiResult<Vec<WindowInfo>> {
        if !command_exists("wmctrl").await {
            return Err(UiError::OperationFailed(
                "wmctrl not found (install 'wmctrl' package)".to_string(),
            ));
        }
        let output = Command::new("wmctrl")
            .args(["-l", "-x"])
            .env("DISPLAY", &self.display)
            .output()
            .await?;
        if !output.status.success() {
            return Err(UiError::OperationFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(parse_wmctrl_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn dump_tree(
        &self,
        _window_id: &str,
        _max_items: usize,
        _include_offscreen: bool,
    ) -> UiResult<Vec<UiNode>> {
        Err(UiError::OperationFailed(
            "no accessibility bridge on this provider".to_string(),
        ))
    }

    async fn invoke(&self, _node_id: &str) -> UiResult<()> {
        Err(UiError::OperationFailed(
            "no accessibility bridge on this provider".to_string(),
        ))
    }

    async fn set_value(&self, _node_id: &str, _value: &str) -> UiResult<()> {
        Err(UiError::OperationFailed(
            "no accessibility bridge on this provider".to_string(),
        ))
    }
}
