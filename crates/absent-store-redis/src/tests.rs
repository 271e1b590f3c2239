//! Tests against a live Redis server.
//!
//! Set `ABSENT_TEST_REDIS` to a `redis://` URL to run them; they are skipped
//! otherwise. Every test uses its own key prefix so runs do not interfere.

use std::time::Duration;

use absent_core::{
  store::SuppressionStore,
  suppression::{to_store_precision, Claim, SuppressionKey},
  Identity,
};
use chrono::{TimeDelta, Utc};

use crate::RedisStore;

async fn store(test: &str) -> Option<RedisStore> {
  let Ok(url) = std::env::var("ABSENT_TEST_REDIS") else {
    eprintln!("ABSENT_TEST_REDIS not set; skipping {test}");
    return None;
  };
  let prefix = format!("absent-test:{test}:{}", Utc::now().timestamp_nanos_opt().unwrap_or(0));
  Some(
    RedisStore::open(&url, Duration::from_secs(5))
      .await
      .expect("redis connection")
      .with_prefix(prefix)
      .with_expiry(Some(Duration::from_secs(60))),
  )
}

fn key() -> SuppressionKey {
  SuppressionKey::new(
    &Identity::parse("testsender@example.com").unwrap(),
    &Identity::parse("testrcpt@example.com").unwrap(),
  )
}

fn interval() -> TimeDelta { TimeDelta::seconds(2) }

#[tokio::test]
async fn record_then_suppress() {
  let Some(s) = store("record_then_suppress").await else { return };
  let k = key();
  let sent = to_store_precision(Utc::now());

  assert!(!s.should_suppress(&k, sent, interval()).await.unwrap());
  s.record_sent(&k, sent).await.unwrap();
  assert!(s.should_suppress(&k, sent, interval()).await.unwrap());
  assert!(!s.should_suppress(&k, sent + interval(), interval()).await.unwrap());
}

#[tokio::test]
async fn claim_is_exclusive_within_interval() {
  let Some(s) = store("claim_is_exclusive_within_interval").await else { return };
  let k = key();
  let now = Utc::now();

  assert!(s.claim(&k, now, interval()).await.unwrap().is_acquired());
  assert_eq!(s.claim(&k, now, interval()).await.unwrap(), Claim::Suppressed);

  let later = now + TimeDelta::seconds(3);
  match s.claim(&k, later, interval()).await.unwrap() {
    Claim::Acquired { previous, .. } => assert_eq!(previous, Some(to_store_precision(now))),
    Claim::Suppressed => panic!("expired record should not suppress"),
  }
}

#[tokio::test]
async fn release_undoes_claim() {
  let Some(s) = store("release_undoes_claim").await else { return };
  let k = key();

  let Claim::Acquired { claimed_at, previous } =
    s.claim(&k, Utc::now(), interval()).await.unwrap()
  else {
    panic!("expected to acquire");
  };
  s.release(&k, claimed_at, previous).await.unwrap();

  assert!(s.get(&k).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_claims_admit_one() {
  let Some(s) = store("concurrent_claims_admit_one").await else { return };
  let k = key();
  let now = Utc::now();

  let mut tasks = Vec::new();
  for _ in 0..8 {
    let s = s.clone();
    let k = k.clone();
    tasks.push(tokio::spawn(async move { s.claim(&k, now, TimeDelta::days(1)).await }));
  }

  let mut acquired = 0;
  for task in tasks {
    if task.await.unwrap().unwrap().is_acquired() {
      acquired += 1;
    }
  }
  assert_eq!(acquired, 1);
}

#[tokio::test]
async fn unreachable_server_is_an_error() {
  // Port 1 is reserved and never runs redis.
  let result = RedisStore::connect("127.0.0.1", 1, 0, Duration::from_secs(2)).await;
  assert!(result.is_err());
}
