//! Batch inputs and claim texts shared by the integration tests

use video_claim_verify::models::batch::BatchInput;

/// One video in a test batch and how the scripted pipeline should finish it.
#[derive(Debug, Clone)]
pub struct TestVideoFixture {
    pub id: &'static str,
    pub video_url: &'static str,
    pub category: &'static str,
    /// `Ok(output_id)` completes the task, `Err(detail)` fails it.
    pub outcome: Result<&'static str, &'static str>,
    pub description: &'static str,
}

pub const TEST_VIDEOS: &[TestVideoFixture] = &[
    TestVideoFixture {
        id: "test_01",
        video_url: "https://videos.example.com/watch/dr-smith-detox",
        category: "health",
        outcome: Ok("dr_smith_detox_20240301"),
        description: "Self-described surgeon promoting a detox tea",
    },
    TestVideoFixture {
        id: "test_02",
        video_url: "https://videos.example.com/watch/stanford-sleep-study",
        category: "science",
        outcome: Ok("stanford_sleep_study_20240301"),
        description: "Creator citing a university sleep study",
    },
    TestVideoFixture {
        id: "test_03",
        video_url: "https://videos.example.com/watch/muted-clip",
        category: "finance",
        outcome: Err("no speech detected in audio track"),
        description: "Clip with no usable audio",
    },
];

pub fn batch_inputs() -> Vec<BatchInput> {
    TEST_VIDEOS
        .iter()
        .map(|v| BatchInput {
            id: v.id.to_string(),
            video_url: v.video_url.to_string(),
            category: Some(v.category.to_string()),
            label: None,
            metadata: Default::default(),
        })
        .collect()
}
