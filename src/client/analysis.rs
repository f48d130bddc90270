//! Client-side analysis controllers.
//!
//! Outline analysis re-runs on its own only when the section count settles
//! on a value different from the one the last analysis saw. Topic rewrites
//! that keep the count steady never trigger it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::timer::Debouncer;
use super::transport::{SharedTransport, user_message};
use crate::analysis::FixRequest;
use crate::constants::analysis::OUTLINE_DEBOUNCE_SECS;
use crate::types::{
    BookError, CONTENT_CHANGED, ChapterSuggestion, FixResult, OutlineAnalysis, QaAnalysisResult, Result,
};

const OUTLINE_ANALYZE_PATH: &str = "/api/outline/analyze";
const QA_ANALYZE_PATH: &str = "/api/qa/analyze";
const QA_FIX_PATH: &str = "/api/qa/fix";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutlineAnalysisState {
    pub loading: bool,
    pub result: Option<OutlineAnalysis>,
    pub error: Option<String>,
    pub dismissed: HashSet<String>,
}

impl OutlineAnalysisState {
    /// Suggestions from the latest result minus the dismissed ones
    pub fn visible_suggestions(&self) -> Vec<&ChapterSuggestion> {
        self.result
            .iter()
            .flat_map(|r| r.suggestions.iter())
            .filter(|s| !self.dismissed.contains(&s.id))
            .collect()
    }
}

#[derive(Default)]
struct Tracking {
    state: OutlineAnalysisState,
    /// Section count the last analysis ran against
    baseline: Option<usize>,
    /// Most recently observed section count
    observed: Option<usize>,
    epoch: u64,
    cancel: Option<CancellationToken>,
}

struct Inner {
    transport: SharedTransport,
    outline_id: String,
    tracking: Mutex<Tracking>,
    tx: watch::Sender<OutlineAnalysisState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Tracking> {
        self.tracking.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, tracking: &Tracking) {
        self.tx.send_replace(tracking.state.clone());
    }

    fn count_changed(&self) -> bool {
        let tracking = self.lock();
        tracking.observed != tracking.baseline
    }

    async fn analyze(&self) {
        let (epoch, token) = {
            let mut tracking = self.lock();
            if let Some(previous) = tracking.cancel.take() {
                previous.cancel();
            }
            tracking.epoch += 1;
            let token = CancellationToken::new();
            tracking.cancel = Some(token.clone());
            tracking.baseline = tracking.observed;
            tracking.state.loading = true;
            tracking.state.error = None;
            self.publish(&tracking);
            (tracking.epoch, token)
        };

        let body = json!({ "outlineId": self.outline_id });
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(BookError::Cancelled),
            reply = self.transport.post_json(OUTLINE_ANALYZE_PATH, body, &token) => {
                reply.and_then(|value| Ok(serde_json::from_value::<OutlineAnalysis>(value)?))
            }
        };

        let mut tracking = self.lock();
        if tracking.epoch != epoch {
            debug!(epoch, "Dropping superseded outline analysis");
            return;
        }
        tracking.cancel = None;
        tracking.state.loading = false;
        match outcome {
            Ok(analysis) => {
                info!(
                    outline = %self.outline_id,
                    score = analysis.overall_score,
                    suggestions = analysis.suggestions.len(),
                    "Outline analysis updated"
                );
                tracking.state.result = Some(analysis);
            }
            Err(e) if e.is_cancellation() => {}
            Err(e) => tracking.state.error = Some(user_message(&e)),
        }
        self.publish(&tracking);
    }
}

/// Keeps one outline's analysis current
pub struct OutlineAnalysisController {
    inner: Arc<Inner>,
    debouncer: Debouncer,
    delay: Duration,
}

impl OutlineAnalysisController {
    pub fn new(transport: SharedTransport, outline_id: impl Into<String>) -> Self {
        Self::with_delay(transport, outline_id, Duration::from_secs(OUTLINE_DEBOUNCE_SECS))
    }

    pub fn with_delay(transport: SharedTransport, outline_id: impl Into<String>, delay: Duration) -> Self {
        let (tx, _) = watch::channel(OutlineAnalysisState::default());
        Self {
            inner: Arc::new(Inner {
                transport,
                outline_id: outline_id.into(),
                tracking: Mutex::new(Tracking::default()),
                tx,
            }),
            debouncer: Debouncer::new(),
            delay,
        }
    }

    pub fn state(&self) -> OutlineAnalysisState {
        self.inner.lock().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OutlineAnalysisState> {
        self.inner.tx.subscribe()
    }

    /// Report the outline's current section count.
    ///
    /// The first report only sets the baseline. Later changes restart the
    /// quiet window; when it ends, analysis runs if the settled count
    /// differs from the baseline.
    pub fn observe_section_count(&self, count: usize) {
        let previous = {
            let mut tracking = self.inner.lock();
            if tracking.baseline.is_none() && tracking.observed.is_none() {
                tracking.baseline = Some(count);
            }
            tracking.observed.replace(count)
        };

        if previous.is_none() || previous == Some(count) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        self.debouncer.schedule(self.delay, async move {
            if inner.count_changed() {
                inner.analyze().await;
            } else {
                debug!("Section count settled on its baseline");
            }
        });
    }

    /// Analyze now, dropping any pending automatic trigger
    pub async fn refresh(&self) {
        self.debouncer.cancel_pending();
        self.inner.analyze().await;
    }

    /// Abandon the in-flight request, if any
    pub fn cancel(&self) {
        self.debouncer.cancel_pending();
        let mut tracking = self.inner.lock();
        if let Some(token) = tracking.cancel.take() {
            token.cancel();
            tracking.epoch += 1;
            tracking.state.loading = false;
            self.inner.publish(&tracking);
        }
    }

    /// Hide a suggestion without removing it from the result
    pub fn dismiss(&self, suggestion_id: impl Into<String>) {
        let mut tracking = self.inner.lock();
        if tracking.state.dismissed.insert(suggestion_id.into()) {
            self.inner.publish(&tracking);
        }
    }
}

/// Result of asking the server to apply a QA fix
#[derive(Debug, Clone, PartialEq)]
pub enum FixOutcome {
    Applied(FixResult),
    /// The chapter moved on since the analysis; the author should re-run it
    ContentChanged(String),
}

/// Book QA calls
pub struct QaClient {
    transport: SharedTransport,
}

impl QaClient {
    pub fn new(transport: SharedTransport) -> Self {
        Self { transport }
    }

    pub async fn analyze(&self, book_id: &str, cancel: &CancellationToken) -> Result<QaAnalysisResult> {
        let value = self
            .transport
            .post_json(QA_ANALYZE_PATH, json!({ "bookId": book_id }), cancel)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Apply one fix. A content conflict is an outcome, not an error, and is
    /// never retried.
    pub async fn apply_fix(&self, request: &FixRequest, cancel: &CancellationToken) -> Result<FixOutcome> {
        let body = serde_json::to_value(request)?;
        match self.transport.post_json(QA_FIX_PATH, body, cancel).await {
            Ok(value) => Ok(FixOutcome::Applied(serde_json::from_value(value)?)),
            Err(e) if e.code() == Some(CONTENT_CHANGED) => Ok(FixOutcome::ContentChanged(user_message(&e))),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::testing::{Reply, ScriptedTransport};

    fn analysis(summary: &str, ids: &[&str]) -> serde_json::Value {
        let suggestions: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                json!({
                    "id": id,
                    "title": format!("Chapter idea {}", i),
                    "description": "",
                    "insertPosition": i,
                    "priority": "medium",
                    "rationale": "gap"
                })
            })
            .collect();
        json!({
            "suggestions": suggestions,
            "coverage": [],
            "overallScore": 70,
            "summary": summary
        })
    }

    fn controller(transport: &Arc<ScriptedTransport>) -> OutlineAnalysisController {
        OutlineAnalysisController::new(transport.clone(), "outline-1")
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_returning_to_baseline_triggers_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let ctrl = controller(&transport);

        for count in [5, 6, 6, 5] {
            ctrl.observe_section_count(count);
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_count_change_triggers_once() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(analysis("Solid start", &["s1"]));
        let ctrl = controller(&transport);

        ctrl.observe_section_count(5);
        ctrl.observe_section_count(6);
        ctrl.observe_section_count(7);
        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(transport.call_count(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.call_count(), 1);
        let (path, body) = transport.calls.lock().unwrap()[0].clone();
        assert_eq!(path, OUTLINE_ANALYZE_PATH);
        assert_eq!(body, json!({"outlineId": "outline-1"}));

        let state = ctrl.state();
        assert!(!state.loading);
        assert_eq!(state.result.unwrap().summary, "Solid start");

        // The analyzed count is the new baseline
        ctrl.observe_section_count(8);
        ctrl.observe_section_count(7);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_cancels_pending_trigger() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(analysis("Manual", &[]));
        let ctrl = controller(&transport);

        ctrl.observe_section_count(3);
        ctrl.observe_section_count(4);
        ctrl.refresh().await;
        assert_eq!(transport.call_count(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.call_count(), 1);
        assert_eq!(ctrl.state().result.unwrap().summary, "Manual");
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_request_supersedes_inflight_one() {
        let transport = Arc::new(ScriptedTransport::new());
        let _gate = transport.push_gated(Reply::Json(Ok(analysis("Stale", &[]))));
        transport.push_json(analysis("Fresh", &[]));
        let ctrl = Arc::new(controller(&transport));

        let first = {
            let ctrl = Arc::clone(&ctrl);
            tokio::spawn(async move { ctrl.refresh().await })
        };
        tokio::task::yield_now().await;
        assert!(ctrl.state().loading);

        ctrl.refresh().await;
        first.await.unwrap();

        let state = ctrl.state();
        assert_eq!(transport.call_count(), 2);
        assert_eq!(state.result.unwrap().summary, "Fresh");
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_silent() {
        let transport = Arc::new(ScriptedTransport::new());
        let _gate = transport.push_gated(Reply::Json(Ok(analysis("Late", &[]))));
        let ctrl = Arc::new(controller(&transport));

        let task = {
            let ctrl = Arc::clone(&ctrl);
            tokio::spawn(async move { ctrl.refresh().await })
        };
        tokio::task::yield_now().await;
        ctrl.cancel();
        ctrl.cancel();
        task.await.unwrap();

        let state = ctrl.state();
        assert!(!state.loading);
        assert!(state.result.is_none());
        assert!(state.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismissed_suggestions_are_hidden() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(analysis("Two ideas", &["s1", "s2"]));
        transport.push_json(analysis("Same ideas", &["s1", "s2"]));
        let ctrl = controller(&transport);

        ctrl.refresh().await;
        ctrl.dismiss("s1");
        let state = ctrl.state();
        let visible: Vec<_> = state.visible_suggestions().iter().map(|s| s.id.clone()).collect();
        assert_eq!(visible, vec!["s2"]);
        assert_eq!(state.result.as_ref().unwrap().suggestions.len(), 2);

        ctrl.refresh().await;
        assert_eq!(ctrl.state().visible_suggestions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_shown_inline() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Reply::Json(Err(BookError::Http {
            status: 404,
            message: "Outline not found: outline-1".into(),
        })));
        let ctrl = controller(&transport);

        ctrl.refresh().await;
        let state = ctrl.state();
        assert_eq!(state.error.as_deref(), Some("Outline not found: outline-1"));
        assert!(!state.loading);
    }

    fn fix_request() -> FixRequest {
        FixRequest {
            book_id: "book-1".into(),
            chapter_id: "ch-1".into(),
            suggestion_id: "q1".into(),
            original_text: "teh".into(),
            suggested_fix: "the".into(),
        }
    }

    #[tokio::test]
    async fn test_fix_conflict_asks_for_rerun() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Reply::Json(Err(BookError::content_changed("Re-run the analysis."))));
        let client = QaClient::new(transport.clone());

        let outcome = client
            .apply_fix(&fix_request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, FixOutcome::ContentChanged("Re-run the analysis.".into()));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fix_applied() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(json!({"success": true, "updatedWordCount": 42, "fuzzyMatch": false}));
        let client = QaClient::new(transport.clone());

        let outcome = client
            .apply_fix(&fix_request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            FixOutcome::Applied(FixResult {
                success: true,
                updated_word_count: 42,
                fuzzy_match: false,
            })
        );
        let (path, body) = transport.calls.lock().unwrap()[0].clone();
        assert_eq!(path, QA_FIX_PATH);
        assert_eq!(body["originalText"], "teh");
    }

    #[tokio::test]
    async fn test_other_fix_errors_propagate() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Reply::Json(Err(BookError::Http {
            status: 500,
            message: "boom".into(),
        })));
        let client = QaClient::new(transport);

        let err = client
            .apply_fix(&fix_request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BookError::Http { status: 500, .. }));
    }
}
