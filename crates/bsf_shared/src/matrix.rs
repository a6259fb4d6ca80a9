//! Row-major matrices for every shape a shader parameter can declare.
//!
//! ```text
//!   Mat2    Mat2x3  Mat2x4
//!   Mat3x2  Mat3    Mat3x4
//!   Mat4x2  Mat4x3  Mat4
//! ```
//!
//! Only storage is provided. The material layer treats them as opaque blocks
//! of `ROWS * COLS` floats.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

macro_rules! matrix {
    ($(#[$doc:meta])* $name:ident, $rows:literal, $cols:literal) => {
        $(#[$doc])*
        #[repr(C)]
        #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
        pub struct $name {
            /// Rows of the matrix
            pub m: [[f32; $cols]; $rows],
        }

        impl $name {
            /// Number of rows
            pub const ROWS: usize = $rows;
            /// Number of columns
            pub const COLS: usize = $cols;

            /// All-zero matrix
            pub const ZERO: Self = Self { m: [[0.0; $cols]; $rows] };

            /// Ones on the main diagonal, zero elsewhere
            pub const IDENTITY: Self = {
                let mut m = [[0.0; $cols]; $rows];
                let mut i = 0;
                while i < $rows && i < $cols {
                    m[i][i] = 1.0;
                    i += 1;
                }
                Self { m }
            };

            /// Creates a matrix from its rows
            #[must_use]
            pub const fn from_rows(m: [[f32; $cols]; $rows]) -> Self {
                Self { m }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::IDENTITY
            }
        }
    };
}

matrix!(
    /// 2x2 matrix
    Mat2, 2, 2
);
matrix!(
    /// 2x3 matrix
    Mat2x3, 2, 3
);
matrix!(
    /// 2x4 matrix
    Mat2x4, 2, 4
);
matrix!(
    /// 3x2 matrix
    Mat3x2, 3, 2
);
matrix!(
    /// 3x3 matrix
    Mat3, 3, 3
);
matrix!(
    /// 3x4 matrix
    Mat3x4, 3, 4
);
matrix!(
    /// 4x2 matrix
    Mat4x2, 4, 2
);
matrix!(
    /// 4x3 matrix
    Mat4x3, 4, 3
);
matrix!(
    /// 4x4 matrix
    Mat4, 4, 4
);
