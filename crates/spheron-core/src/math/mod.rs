// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Provides the small set of mathematics primitives the displacement
//! pipeline needs.

pub use std::f32::consts::PI;

pub mod vector;

pub use self::vector::Vec3;

/// Returns `ceil(factor * count)`, the amortized capacity for `count` items.
///
/// The multiplication is performed in `f64` so that counts up to `u32::MAX`
/// do not lose integer precision.
///
/// # Examples
///
/// ```
/// use spheron_core::math::scaled_capacity;
/// assert_eq!(scaled_capacity(100, 1.25), 125);
/// assert_eq!(scaled_capacity(10, 1.25), 13);
/// ```
#[inline]
pub fn scaled_capacity(count: usize, factor: f64) -> usize {
    (count as f64 * factor).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_capacity_rounds_up() {
        assert_eq!(scaled_capacity(0, 1.25), 0);
        assert_eq!(scaled_capacity(1, 1.25), 2);
        assert_eq!(scaled_capacity(4, 1.25), 5);
        assert_eq!(scaled_capacity(90, 1.0), 90);
    }
}
