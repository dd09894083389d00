//! Scanner tests against an in-memory cluster

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, Pod};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::cluster::{CallContext, ClusterApi, ClusterError};
use crate::fixtures::{event, running, terminated, ts, waiting, PodFixture};
use crate::health::DetectorStatus;
use crate::models::PodIdentity;

#[derive(Default)]
struct FakeCluster {
    pods: Vec<Pod>,
    events: HashMap<String, Vec<Event>>,
    /// Event queries for these uids fail with 403
    failing_uids: HashSet<String>,
    /// Event queries for these uids panic inside the query task
    panicking_uids: HashSet<String>,
    /// Pod listing fails with this status code
    list_error: Option<u16>,
    event_delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    event_queries: Mutex<Vec<(Option<String>, String)>>,
}

impl FakeCluster {
    fn with_pods(pods: Vec<Pod>) -> Self {
        Self {
            pods,
            ..Default::default()
        }
    }

    fn events(mut self, uid: &str, events: Vec<Event>) -> Self {
        self.events.insert(uid.to_string(), events);
        self
    }

    fn failing(mut self, uid: &str) -> Self {
        self.failing_uids.insert(uid.to_string());
        self
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        ctx: &CallContext,
    ) -> Result<Vec<Pod>, ClusterError> {
        ctx.check()?;
        if let Some(code) = self.list_error {
            return Err(ClusterError::Api {
                code,
                message: "pods is forbidden".to_string(),
            });
        }
        Ok(self
            .pods
            .iter()
            .filter(|pod| namespace.is_none() || pod.metadata.namespace.as_deref() == namespace)
            .cloned()
            .collect())
    }

    async fn list_events(
        &self,
        namespace: Option<&str>,
        involved_uid: &str,
        ctx: &CallContext,
    ) -> Result<Vec<Event>, ClusterError> {
        self.event_queries
            .lock()
            .unwrap()
            .push((namespace.map(str::to_string), involved_uid.to_string()));
        if self.panicking_uids.contains(involved_uid) {
            panic!("event decoder crashed for {involved_uid}");
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let result = ctx
            .guard(async {
                if let Some(delay) = self.event_delay {
                    tokio::time::sleep(delay).await;
                }
                if self.failing_uids.contains(involved_uid) {
                    return Err(ClusterError::Api {
                        code: 403,
                        message: "events is forbidden".to_string(),
                    });
                }
                Ok(self.events.get(involved_uid).cloned().unwrap_or_default())
            })
            .await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn scanner(cluster: FakeCluster) -> (Scanner, Arc<FakeCluster>) {
    let cluster = Arc::new(cluster);
    let scanner = Scanner::new(cluster.clone(), ScanConfig::default());
    (scanner, cluster)
}

fn findings_for<'a>(report: &'a ScanReport, uid: &str) -> &'a PodFindings {
    report
        .findings
        .iter()
        .find(|f| f.identity == PodIdentity::new(uid))
        .unwrap_or_else(|| panic!("no findings for {uid}"))
}

#[tokio::test]
async fn test_crash_looping_container_in_running_pod() {
    let pod = PodFixture::new("web", "uid-1")
        .container(running("sidecar"))
        .container(waiting("app", "CrashLoopBackOff", "back-off 5m0s restarting"))
        .build();
    let (scanner, _) = scanner(FakeCluster::with_pods(vec![pod]));

    let report = scanner.scan(Some("default"), &CallContext::default()).await.unwrap();

    let findings = findings_for(&report, "uid-1");
    assert!(findings.record(DetectorSource::PodPhase).is_none());
    let record = findings.record(DetectorSource::ContainerStatus).unwrap();
    assert_eq!(record.reason, "CrashLoopBackOff");
    assert_eq!(record.container_name.as_deref(), Some("app"));
    assert_eq!(report.record_count(), 1);
}

#[tokio::test]
async fn test_ready_condition_failure() {
    let pod = PodFixture::new("web", "uid-1")
        .condition("Ready", "False", Some("ContainersNotReady"), ts(120))
        .build();
    let (scanner, _) = scanner(FakeCluster::with_pods(vec![pod]));

    let report = scanner.scan(None, &CallContext::default()).await.unwrap();

    let record = findings_for(&report, "uid-1")
        .record(DetectorSource::PodCondition)
        .unwrap();
    assert_eq!(record.reason, "ContainersNotReady");
    assert_eq!(record.timestamp, Some(ts(120)));
}

#[tokio::test]
async fn test_two_suspicious_warning_events() {
    let pod = PodFixture::new("web", "uid-1").build();
    let cluster = FakeCluster::with_pods(vec![pod]).events(
        "uid-1",
        vec![
            event("uid-1", "Warning", "FailedMount", "MountVolume.SetUp failed"),
            event("uid-1", "Warning", "Preempting", "Preempted by a higher priority pod"),
            event("uid-1", "Warning", "BackOff", "Back-off pulling image"),
        ],
    );
    let (scanner, _) = scanner(cluster);

    let report = scanner.scan(Some("default"), &CallContext::default()).await.unwrap();

    let record = findings_for(&report, "uid-1")
        .record(DetectorSource::EventChecker)
        .unwrap();
    assert_eq!(
        record.event_messages,
        vec![
            "FailedMount: MountVolume.SetUp failed",
            "BackOff: Back-off pulling image",
        ]
    );
}

#[tokio::test]
async fn test_one_pod_in_every_detector() {
    let pod = PodFixture::new("worker", "uid-1")
        .phase("Failed")
        .container(terminated("job", 137, Some("OOMKilled"), "out of memory"))
        .condition("ContainersReady", "False", Some("ContainersNotReady"), ts(30))
        .build();
    let cluster = FakeCluster::with_pods(vec![pod]).events(
        "uid-1",
        vec![event("uid-1", "Warning", "BackOff", "Back-off restarting")],
    );
    let (scanner, _) = scanner(cluster);

    let report = scanner.scan(Some("default"), &CallContext::default()).await.unwrap();

    let findings = findings_for(&report, "uid-1");
    let sources: Vec<_> = findings.sources().collect();
    assert_eq!(sources, DetectorSource::ALL.to_vec());
    assert_eq!(
        findings
            .record(DetectorSource::ContainerStatus)
            .unwrap()
            .exit_code,
        Some(137)
    );
    assert!(report
        .count_by_source()
        .values()
        .all(|count| *count == 1));
}

#[tokio::test]
async fn test_event_failure_does_not_abort_scan() {
    let broken = PodFixture::new("broken", "uid-1").build();
    let healthy = PodFixture::new("noisy", "uid-2").build();
    let cluster = FakeCluster::with_pods(vec![broken, healthy])
        .failing("uid-1")
        .events(
            "uid-2",
            vec![event("uid-2", "Warning", "Unhealthy", "Liveness probe failed")],
        );
    let (scanner, _) = scanner(cluster);

    let report = scanner.scan(Some("default"), &CallContext::default()).await.unwrap();

    assert!(report.is_partial());
    assert_eq!(report.event_fetch_failures.len(), 1);
    let failure = &report.event_fetch_failures[0];
    assert_eq!(failure.pod, PodIdentity::new("uid-1"));
    assert_eq!(failure.pod_name, "broken");
    assert!(!failure.cancelled);

    assert!(findings_for(&report, "uid-2")
        .record(DetectorSource::EventChecker)
        .is_some());
    assert_eq!(
        report.detectors[&DetectorSource::EventChecker].status,
        DetectorStatus::Degraded
    );
    assert_eq!(report.status(), DetectorStatus::Degraded);
}

#[tokio::test]
async fn test_crashed_event_task_is_recorded_as_failure() {
    let crashed = PodFixture::new("crashed", "uid-1").build();
    let noisy = PodFixture::new("noisy", "uid-2").build();
    let mut cluster = FakeCluster::with_pods(vec![crashed, noisy]).events(
        "uid-2",
        vec![event("uid-2", "Warning", "BackOff", "Back-off restarting failed container")],
    );
    cluster.panicking_uids.insert("uid-1".to_string());
    let (scanner, _) = scanner(cluster);

    let report = scanner.scan(Some("default"), &CallContext::default()).await.unwrap();

    assert!(report.is_partial());
    assert_eq!(report.event_fetch_failures.len(), 1);
    let failure = &report.event_fetch_failures[0];
    assert_eq!(failure.pod, PodIdentity::new("uid-1"));
    assert_eq!(failure.pod_name, "crashed");
    assert_eq!(failure.namespace, "default");
    assert!(!failure.cancelled);

    assert!(findings_for(&report, "uid-2")
        .record(DetectorSource::EventChecker)
        .is_some());
    assert_eq!(
        report.detectors[&DetectorSource::EventChecker].status,
        DetectorStatus::Degraded
    );
}

#[tokio::test]
async fn test_pod_list_failure_propagates() {
    let cluster = FakeCluster {
        list_error: Some(403),
        ..Default::default()
    };
    let (scanner, cluster) = scanner(cluster);

    let err = scanner
        .scan(Some("restricted"), &CallContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ClusterError::Api { code: 403, .. }));
    assert!(cluster.event_queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_cluster() {
    let (scanner, _) = scanner(FakeCluster::default());

    let report = scanner.scan(None, &CallContext::default()).await.unwrap();

    assert_eq!(report.pods_scanned, 0);
    assert!(!report.has_anomalies());
    assert!(!report.is_partial());
    assert_eq!(report.detectors.len(), DetectorSource::ALL.len());
    assert_eq!(report.status(), DetectorStatus::Healthy);
}

#[tokio::test]
async fn test_cancelled_scan_is_an_error() {
    let pods = (0..4)
        .map(|i| PodFixture::new(&format!("web-{i}"), &format!("uid-{i}")).build())
        .collect();
    let cluster = FakeCluster {
        event_delay: Some(Duration::from_secs(30)),
        ..FakeCluster::with_pods(pods)
    };
    let (scanner, _) = scanner(cluster);

    let token = CancellationToken::new();
    let ctx = CallContext::new(token.clone());
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let err = scanner.scan(None, &ctx).await.unwrap_err();
    assert!(matches!(err, ClusterError::Cancelled));
    canceller.await.unwrap();
}

#[tokio::test]
async fn test_scan_timeout_from_config() {
    let pods = vec![PodFixture::new("web", "uid-1").build()];
    let cluster = Arc::new(FakeCluster {
        event_delay: Some(Duration::from_secs(30)),
        ..FakeCluster::with_pods(pods)
    });
    let config = ScanConfig {
        scan_timeout_secs: Some(0),
        ..Default::default()
    };
    let scanner = Scanner::new(cluster, config);

    let err = scanner
        .scan(None, &CallContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClusterError::DeadlineExceeded));
}

#[tokio::test]
async fn test_event_queries_are_bounded_and_scoped() {
    let pods = (0..12)
        .map(|i| PodFixture::new(&format!("web-{i}"), &format!("uid-{i}")).build())
        .collect();
    let cluster = Arc::new(FakeCluster {
        event_delay: Some(Duration::from_millis(10)),
        ..FakeCluster::with_pods(pods)
    });
    let config = ScanConfig {
        event_concurrency: 3,
        ..Default::default()
    };
    let scanner = Scanner::new(cluster.clone(), config);

    scanner
        .scan(Some("default"), &CallContext::default())
        .await
        .unwrap();

    let queries = cluster.event_queries.lock().unwrap();
    assert_eq!(queries.len(), 12);
    assert!(queries
        .iter()
        .all(|(ns, _)| ns.as_deref() == Some("default")));
    assert!(cluster.peak_in_flight.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn test_pod_without_uid_is_skipped() {
    let anonymous = PodFixture::new("ghost", "").phase("Pending").build();
    let pending = PodFixture::new("web", "uid-1").phase("Pending").build();
    let (scanner, cluster) = scanner(FakeCluster::with_pods(vec![anonymous, pending]));

    let report = scanner.scan(None, &CallContext::default()).await.unwrap();

    assert_eq!(report.pods_scanned, 2);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].pod_name, "web");
    assert_eq!(cluster.event_queries.lock().unwrap().len(), 1);
}
