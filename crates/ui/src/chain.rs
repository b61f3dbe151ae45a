//! Target-resolution fallback chain and the session facade.
//!
//! The chain is an ordered list of strategies, each tried in turn and
//! each more expensive and less precise than the one before it.
//! Adding or reordering a tier is a data change on the session, not a
//! control-flow rewrite.

use crate::error::{UiError, UiResult};
use crate::ocr;
use crate::provider::{AccessibilityProvider, PointerDriver};
use crate::screen::{self, Screenshot};
use crate::search;
use crate::template;
use crate::types::{ControlMatch, Point, UiNode, WindowInfo};
use crate::vlm::VlmClient;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source of fresh captures for the visual tiers. Abstracted so tests
/// can supply prepared images instead of a live display.
#[async_trait]
pub trait ScreenSource: Send + Sync {
    async fn capture(&self) -> UiResult<Screenshot>;
}

struct DisplayScreen {
    display: String,
}

#[async_trait]
impl ScreenSource for DisplayScreen {
    async fn capture(&self) -> UiResult<Screenshot> {
        screen::capture(&self.display).await
    }
}

/// Coordinate inference seam; `VlmClient` is the production impl.
#[async_trait]
pub trait VisionLocator: Send + Sync {
    async fn locate(&self, screenshot: &Path, prompt: &str) -> UiResult<Point>;
}

#[async_trait]
impl VisionLocator for VlmClient {
    async fn locate(&self, screenshot: &Path, prompt: &str) -> UiResult<Point> {
        VlmClient::locate(self, screenshot, prompt).await
    }
}

#[derive(Debug, Clone)]
pub struct ClickContext {
    /// Natural-language or control-name description of the target.
    pub query: String,
    /// Window to scope accessibility lookups to, when known.
    pub window_id: Option<String>,
    /// Reference image for the template tier.
    pub template: Option<PathBuf>,
    pub button: String,
}

#[derive(Debug, Clone)]
pub struct ClickOutcome {
    pub method: String,
    pub point: Option<Point>,
    /// False for read-only tiers (OCR) that located the target but
    /// must not synthesize input.
    pub clicked: bool,
    pub text: Option<String>,
}

/// One tier of the chain. `Ok(None)` means "no match here, try the
/// next tier"; errors are internal tier failures and also fall
/// through, after a log line.
#[async_trait]
pub trait ClickStrategy: Send + Sync {
    fn name(&self) -> &str;
    async fn attempt(&self, ctx: &ClickContext) -> UiResult<Option<ClickOutcome>>;
}

/// Tier 1: accessibility-tree lookup by name, exact and cheap.
pub struct AccessibilityStrategy {
    pub provider: Arc<dyn AccessibilityProvider>,
    pub max_items: usize,
}

#[async_trait]
impl ClickStrategy for AccessibilityStrategy {
    fn name(&self) -> &str {
        "accessibility"
    }

    async fn attempt(&self, ctx: &ClickContext) -> UiResult<Option<ClickOutcome>> {
        let windows = match &ctx.window_id {
            Some(id) => vec![id.clone()],
            None => self
                .provider
                .list_windows()
                .await?
                .into_iter()
                .map(|w| w.id)
                .collect(),
        };

        for window_id in windows {
            let nodes = self.provider.dump_tree(&window_id, self.max_items, false).await?;
            let matches = search::control_search(&nodes, &ctx.query);
            if let Some(best) = matches.first() {
                self.provider.invoke(&best.node.id).await?;
                return Ok(Some(ClickOutcome {
                    method: self.name().to_string(),
                    point: Some(best.node.center()),
                    clicked: true,
                    text: None,
                }));
            }
        }
        Ok(None)
    }
}

/// Tier 2: pixel template match against a provided reference image.
pub struct TemplateStrategy {
    pub screen: Arc<dyn ScreenSource>,
    pub pointer: Arc<dyn PointerDriver>,
    pub confidence: f32,
}

#[async_trait]
impl ClickStrategy for TemplateStrategy {
    fn name(&self) -> &str {
        "template"
    }

    async fn attempt(&self, ctx: &ClickContext) -> UiResult<Option<ClickOutcome>> {
        let Some(template) = &ctx.template else {
            return Ok(None);
        };

        let shot = self.screen.capture().await?;
        let found = template::find_template(shot.path(), template, self.confidence)?;
        match found {
            Some(hit) => {
                self.pointer.click(hit.center, &ctx.button).await?;
                Ok(Some(ClickOutcome {
                    method: self.name().to_string(),
                    point: Some(hit.center),
                    clicked: true,
                    text: None,
                }))
            }
            None => Ok(None),
        }
    }
}

/// Tier 3: vision-model coordinate inference over a fresh screenshot.
pub struct VlmStrategy {
    pub screen: Arc<dyn ScreenSource>,
    pub pointer: Arc<dyn PointerDriver>,
    pub locator: Arc<dyn VisionLocator>,
}

#[async_trait]
impl ClickStrategy for VlmStrategy {
    fn name(&self) -> &str {
        "vlm"
    }

    async fn attempt(&self, ctx: &ClickContext) -> UiResult<Option<ClickOutcome>> {
        let shot = self.screen.capture().await?;
        match self.locator.locate(shot.path(), &ctx.query).await {
            Ok(point) => {
                self.pointer.click(point, &ctx.button).await?;
                Ok(Some(ClickOutcome {
                    method: self.name().to_string(),
                    point: Some(point),
                    clicked: true,
                    text: None,
                }))
            }
            Err(UiError::VlmNoMatch(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }
}

/// Tier 4: OCR text extraction. Read-only — locates the query text
/// and returns it without synthesizing input.
pub struct OcrStrategy {
    pub screen: Arc<dyn ScreenSource>,
}

#[async_trait]
impl ClickStrategy for OcrStrategy {
    fn name(&self) -> &str {
        "ocr"
    }

    async fn attempt(&self, ctx: &ClickContext) -> UiResult<Option<ClickOutcome>> {
        let shot = self.screen.capture().await?;
        let words = ocr::read_words(shot.path(), None).await?;
        let query = ctx.query.to_lowercase();
        let hit = words
            .iter()
            .find(|w| w.text.to_lowercase().contains(&query));
        Ok(hit.map(|word| ClickOutcome {
            method: self.name().to_string(),
            point: Some(word.center()),
            clicked: false,
            text: Some(word.text.clone()),
        }))
    }
}

/// Facade over one isolated surface: window/control operations plus
/// the semantic/visual click chain.
pub struct UiSession {
    accessibility: Arc<dyn AccessibilityProvider>,
    screen: Arc<dyn ScreenSource>,
    strategies: Vec<Box<dyn ClickStrategy>>,
    tree_limit: usize,
}

impl UiSession {
    pub fn new(
        display: impl Into<String>,
        accessibility: Arc<dyn AccessibilityProvider>,
        pointer: Arc<dyn PointerDriver>,
        vlm: Arc<VlmClient>,
    ) -> Self {
        let screen: Arc<dyn ScreenSource> = Arc::new(DisplayScreen {
            display: display.into(),
        });
        let locator: Arc<dyn VisionLocator> = vlm;
        Self::with_parts(accessibility, pointer, screen, locator)
    }

    /// Assemble the session from injected seams. The default chain
    /// order is accessibility, template, vlm, ocr.
    pub fn with_parts(
        accessibility: Arc<dyn AccessibilityProvider>,
        pointer: Arc<dyn PointerDriver>,
        screen: Arc<dyn ScreenSource>,
        locator: Arc<dyn VisionLocator>,
    ) -> Self {
        let strategies: Vec<Box<dyn ClickStrategy>> = vec![
            Box::new(AccessibilityStrategy {
                provider: accessibility.clone(),
                max_items: 500,
            }),
            Box::new(TemplateStrategy {
                screen: screen.clone(),
                pointer: pointer.clone(),
                confidence: template::DEFAULT_CONFIDENCE,
            }),
            Box::new(VlmStrategy {
                screen: screen.clone(),
                pointer: pointer.clone(),
                locator,
            }),
            Box::new(OcrStrategy {
                screen: screen.clone(),
            }),
        ];
        Self {
            accessibility,
            screen,
            strategies,
            tree_limit: 500,
        }
    }

    /// Replace the fallback chain (order included).
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn ClickStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub async fn window_find(&self, title: &str) -> UiResult<WindowInfo> {
        let windows = self.accessibility.list_windows().await?;
        windows
            .into_iter()
            .filter_map(|w| search::score_name(&w.title, title).map(|s| (s, w)))
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, w)| w)
            .ok_or_else(|| UiError::WindowNotFound(title.to_string()))
    }

    pub async fn tree_dump(
        &self,
        window_id: &str,
        max_items: usize,
        include_offscreen: bool,
    ) -> UiResult<Vec<UiNode>> {
        self.accessibility
            .dump_tree(window_id, max_items.min(self.tree_limit), include_offscreen)
            .await
    }

    pub async fn control_search(&self, window_id: &str, query: &str) -> UiResult<Vec<ControlMatch>> {
        let nodes = self.tree_dump(window_id, self.tree_limit, false).await?;
        Ok(search::control_search(&nodes, query))
    }

    pub async fn control_invoke(&self, window_id: &str, name: &str) -> UiResult<UiNode> {
        let matches = self.control_search(window_id, name).await?;
        let best = matches
            .first()
            .ok_or_else(|| UiError::ControlNotFound(name.to_string()))?;
        self.accessibility.invoke(&best.node.id).await?;
        Ok(best.node.clone())
    }

    pub async fn control_set_value(
        &self,
        window_id: &str,
        name: &str,
        value: &str,
    ) -> UiResult<UiNode> {
        let matches = self.control_search(window_id, name).await?;
        let best = matches
            .first()
            .ok_or_else(|| UiError::ControlNotFound(name.to_string()))?;
        self.accessibility.set_value(&best.node.id, value).await?;
        Ok(best.node.clone())
    }

    /// OCR the current surface contents. The capture is deleted as
    /// soon as the text is extracted.
    pub async fn ocr_read_text(&self) -> UiResult<String> {
        let shot = self.screen.capture().await?;
        ocr::read_text(shot.path(), None).await
    }

    /// Run the full fallback chain for a semantic/visual target.
    pub async fn semantic_click(&self, ctx: &ClickContext) -> UiResult<ClickOutcome> {
        for strategy in &self.strategies {
            debug!("Trying strategy '{}' for '{}'", strategy.name(), ctx.query);
            match strategy.attempt(ctx).await {
                Ok(Some(outcome)) => {
                    info!(
                        "Resolved '{}' via '{}' at {:?}",
                        ctx.query, outcome.method, outcome.point
                    );
                    return Ok(outcome);
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!("Strategy '{}' failed for '{}': {}", strategy.name(), ctx.query, e);
                    continue;
                }
            }
        }
        Err(UiError::ControlNotFound(ctx.query.clone()))
    }

    /// Template-driven click: the visual tiers only.
    pub async fn visual_click(&self, template: &Path, button: &str) -> UiResult<ClickOutcome> {
        let ctx = ClickContext {
            query: String::new(),
            window_id: None,
            template: Some(template.to_path_buf()),
            button: button.to_string(),
        };
        for strategy in &self.strategies {
            if strategy.name() != "template" {
                continue;
            }
            if let Some(outcome) = strategy.attempt(&ctx).await? {
                return Ok(outcome);
            }
        }
        Err(UiError::VlmNoMatch("template".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MockAccessibility {
        windows: Vec<WindowInfo>,
        nodes: Vec<UiNode>,
        invoked: Mutex<Vec<String>>,
        values: Mutex<Vec<(String, String)>>,
    }

    impl MockAccessibility {
        fn with_nodes(nodes: Vec<UiNode>) -> Self {
            Self {
                windows: vec![WindowInfo {
                    id: "w1".to_string(),
                    title: "Checkout - Browser".to_string(),
                    app_name: "browser".to_string(),
                }],
                nodes,
                invoked: Mutex::new(Vec::new()),
                values: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AccessibilityProvider for MockAccessibility {
        async fn list_windows(&self) -> UiResult<Vec<WindowInfo>> {
            Ok(self.windows.clone())
        }

        async fn dump_tree(
            &self,
            _window_id: &str,
            max_items: usize,
            include_offscreen: bool,
        ) -> UiResult<Vec<UiNode>> {
            Ok(self
                .nodes
                .iter()
                .filter(|n| include_offscreen || !n.offscreen)
                .take(max_items)
                .cloned()
                .collect())
        }

        async fn invoke(&self, node_id: &str) -> UiResult<()> {
            self.invoked.lock().unwrap().push(node_id.to_string());
            Ok(())
        }

        async fn set_value(&self, node_id: &str, value: &str) -> UiResult<()> {
            self.values
                .lock()
                .unwrap()
                .push((node_id.to_string(), value.to_string()));
            Ok(())
        }
    }

    struct MockPointer {
        clicks: Mutex<Vec<Point>>,
    }

    #[async_trait]
    impl PointerDriver for MockPointer {
        async fn move_to(&self, _point: Point) -> UiResult<()> {
            Ok(())
        }

        async fn click(&self, point: Point, _button: &str) -> UiResult<()> {
            self.clicks.lock().unwrap().push(point);
            Ok(())
        }
    }

    struct NoScreen;

    #[async_trait]
    impl ScreenSource for NoScreen {
        async fn capture(&self) -> UiResult<Screenshot> {
            Err(UiError::OperationFailed("no display in tests".to_string()))
        }
    }

    struct FixedLocator {
        point: Option<Point>,
    }

    #[async_trait]
    impl VisionLocator for FixedLocator {
        async fn locate(&self, _screenshot: &Path, prompt: &str) -> UiResult<Point> {
            self.point
                .ok_or_else(|| UiError::VlmNoMatch(prompt.to_string()))
        }
    }

    fn node(id: &str, name: &str, offscreen: bool) -> UiNode {
        UiNode {
            id: id.to_string(),
            role: "button".to_string(),
            name: name.to_string(),
            x: 100,
            y: 200,
            width: 80,
            height: 24,
            offscreen,
        }
    }

    fn session_with(nodes: Vec<UiNode>) -> (UiSession, Arc<MockAccessibility>) {
        let acc = Arc::new(MockAccessibility::with_nodes(nodes));
        let session = UiSession::with_parts(
            acc.clone(),
            Arc::new(MockPointer {
                clicks: Mutex::new(Vec::new()),
            }),
            Arc::new(NoScreen),
            Arc::new(FixedLocator { point: None }),
        );
        (session, acc)
    }

    #[tokio::test]
    async fn window_find_prefers_best_score() {
        let (session, _) = session_with(vec![]);
        let window = session.window_find("checkout").await.unwrap();
        assert_eq!(window.id, "w1");

        assert!(matches!(
            session.window_find("unrelated").await,
            Err(UiError::WindowNotFound(_))
        ));
    }

    #[tokio::test]
    async fn tree_dump_excludes_offscreen_by_default() {
        let (session, _) = session_with(vec![
            node("a", "Submit", false),
            node("b", "Hidden", true),
        ]);
        let visible = session.tree_dump("w1", 100, false).await.unwrap();
        assert_eq!(visible.len(), 1);

        let all = session.tree_dump("w1", 100, true).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn control_invoke_picks_exact_match() {
        let (session, acc) = session_with(vec![
            node("a", "Submit Order", false),
            node("b", "Submit", false),
        ]);
        let picked = session.control_invoke("w1", "submit").await.unwrap();
        assert_eq!(picked.id, "b");
        assert_eq!(acc.invoked.lock().unwrap().as_slice(), ["b"]);
    }

    #[tokio::test]
    async fn missing_control_is_reported() {
        let (session, _) = session_with(vec![node("a", "Cancel", false)]);
        assert!(matches!(
            session.control_invoke("w1", "submit").await,
            Err(UiError::ControlNotFound(_))
        ));
    }

    #[tokio::test]
    async fn chain_stops_at_accessibility_when_it_matches() {
        let (session, acc) = session_with(vec![node("a", "Pay Now", false)]);
        let outcome = session
            .semantic_click(&ClickContext {
                query: "pay now".to_string(),
                window_id: None,
                template: None,
                button: "left".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.method, "accessibility");
        assert!(outcome.clicked);
        assert_eq!(acc.invoked.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn chain_falls_through_to_vlm() {
        let acc = Arc::new(MockAccessibility::with_nodes(vec![]));
        let pointer = Arc::new(MockPointer {
            clicks: Mutex::new(Vec::new()),
        });

        // Hand-built chain: empty accessibility tier, then a locator
        // that resolves. The screen tier is skipped because template
        // capture fails and errors fall through.
        let strategies: Vec<Box<dyn ClickStrategy>> = vec![
            Box::new(AccessibilityStrategy {
                provider: acc.clone(),
                max_items: 100,
            }),
            Box::new(VlmStrategy {
                screen: Arc::new(TempScreen),
                pointer: pointer.clone(),
                locator: Arc::new(FixedLocator {
                    point: Some(Point { x: 42, y: 24 }),
                }),
            }),
        ];
        let session = UiSession::with_parts(
            acc,
            pointer.clone(),
            Arc::new(NoScreen),
            Arc::new(FixedLocator { point: None }),
        )
        .with_strategies(strategies);

        let outcome = session
            .semantic_click(&ClickContext {
                query: "blue button".to_string(),
                window_id: None,
                template: None,
                button: "left".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.method, "vlm");
        assert_eq!(pointer.clicks.lock().unwrap().as_slice(), [Point { x: 42, y: 24 }]);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_control_not_found() {
        let (session, _) = session_with(vec![]);
        let err = session
            .semantic_click(&ClickContext {
                query: "nothing".to_string(),
                window_id: None,
                template: None,
                button: "left".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UiError::ControlNotFound(_)));
    }

    /// Screen source producing a real (blank) png so the VLM tier can
    /// read it; the guard must delete it afterwards.
    struct TempScreen;

    #[async_trait]
    impl ScreenSource for TempScreen {
        async fn capture(&self) -> UiResult<Screenshot> {
            let path = std::env::temp_dir().join(format!(
                "veildesk-test-shot-{}.png",
                uuid_like()
            ));
            let img = image::ImageBuffer::from_pixel(4, 4, image::Rgba([255u8, 255, 255, 255]));
            img.save(&path)
                .map_err(|e| UiError::OperationFailed(e.to_string()))?;
            Ok(Screenshot::new(path))
        }
    }

    fn uuid_like() -> u128 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn screenshots_do_not_outlive_the_operation() {
        let screen = TempScreen;
        let path = {
            let shot = screen.capture().await.unwrap();
            shot.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
