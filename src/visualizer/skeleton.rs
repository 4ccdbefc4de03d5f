// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// COCO-Pose skeleton as 1-indexed keypoint pairs.
/// Subtract one from each entry before indexing a keypoint vector.
pub const SKELETON: [[usize; 2]; 19] = [
    [16, 14], // left ankle to left knee
    [14, 12], // left knee to left hip
    [17, 15], // right ankle to right knee
    [15, 13], // right knee to right hip
    [12, 13], // left hip to right hip
    [6, 12],  // left shoulder to left hip
    [7, 13],  // right shoulder to right hip
    [6, 7],   // left shoulder to right shoulder
    [6, 8],   // left shoulder to left elbow
    [7, 9],   // right shoulder to right elbow
    [8, 10],  // left elbow to left wrist
    [9, 11],  // right elbow to right wrist
    [2, 3],   // left eye to right eye
    [1, 2],   // nose to left eye
    [1, 3],   // nose to right eye
    [2, 4],   // left eye to left ear
    [3, 5],   // right eye to right ear
    [4, 6],   // left ear to left shoulder
    [5, 7],   // right ear to right shoulder
];

/// Limb color indices into `POSE_COLORS`, one per `SKELETON` entry.
/// Legs light blue, torso magenta, arms orange, face green.
pub const LIMB_COLOR_INDICES: [usize; 19] = [
    9, 9, 9, 9, 7, 7, 7, 0, 0, 0, 0, 0, 16, 16, 16, 16, 16, 16, 16,
];

/// Keypoint color indices into `POSE_COLORS`, one per COCO keypoint.
pub const KPT_COLOR_INDICES: [usize; 17] = [16, 16, 16, 16, 16, 0, 0, 0, 0, 0, 0, 9, 9, 9, 9, 9, 9];

/// Resolve a 1-indexed skeleton pair to 0-indexed keypoint indices.
#[must_use]
pub const fn limb_endpoints(limb: usize) -> (usize, usize) {
    let [a, b] = SKELETON[limb];
    (a - 1, b - 1)
}
