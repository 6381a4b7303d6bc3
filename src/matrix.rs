/// Dense row-major float matrix used for every transform in the pipeline.
///
/// Transform methods consume the matrix and return the result, so chains read
/// as value expressions and the borrow checker rules out aliasing:
///
/// ```ignore
/// let model = Matrix::identity(4).translate(x, y, z).scale(s, s, s);
/// ```
///
/// Operations on an empty matrix are no-ops that hand the matrix back
/// unchanged. Shape mismatches in `mul_matrix`/`add_matrix` are programmer
/// errors and panic.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// A zero-filled `rows` x `cols` matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(size: usize) -> Self {
        let mut matrix = Self::new(size, size);
        for i in 0..size {
            matrix.data[i * size + i] = 1.0;
        }
        matrix
    }

    pub fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        Self {
            rows: 4,
            cols: 4,
            data: rows.concat(),
        }
    }

    /// Perspective projection for a vertical field of view given as the
    /// tangent of the half-angle.
    pub fn perspective(fov_scale: f32, aspect: f32, near: f32, far: f32) -> Self {
        let ymax = near * fov_scale;
        let ymin = -ymax;

        Self::frustum(ymin, ymax, ymin * aspect, ymax * aspect, near, far)
    }

    #[allow(dead_code)]
    pub fn ortho(bottom: f32, top: f32, left: f32, right: f32, near: f32, far: f32) -> Self {
        let x = 2.0 / (right - left);
        let y = 2.0 / (top - bottom);
        let z = 2.0 / (far - near);

        let tx = (right + left) / (right - left);
        let ty = (top + bottom) / (top - bottom);
        let tz = (far + near) / (far - near);

        Self::from_rows([
            [x, 0.0, 0.0, tx],
            [0.0, y, 0.0, ty],
            [0.0, 0.0, z, tz],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn frustum(bottom: f32, top: f32, left: f32, right: f32, near: f32, far: f32) -> Self {
        let x = 2.0 * near / (right - left);
        let y = 2.0 * near / (top - bottom);
        let z = -(far + near) / (far - near);

        let tx = (right + left) / (right - left);
        let ty = (top + bottom) / (top - bottom);
        let tz = -2.0 * (far * near) / (far - near);

        Self::from_rows([
            [x, 0.0, tx, 0.0],
            [0.0, y, ty, 0.0],
            [0.0, 0.0, z, tz],
            [0.0, 0.0, -1.0, 0.0],
        ])
    }

    #[allow(dead_code)]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[allow(dead_code)]
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.cols + col] = value;
    }

    /// Applies `f(value, row, col)` to every element.
    pub fn map(mut self, f: impl Fn(f32, usize, usize) -> f32) -> Self {
        for row in 0..self.rows {
            for col in 0..self.cols {
                let index = row * self.cols + col;
                self.data[index] = f(self.data[index], row, col);
            }
        }
        self
    }

    #[allow(dead_code)]
    pub fn add_scalar(self, n: f32) -> Self {
        self.map(|el, _, _| el + n)
    }

    /// Adds `v[col]` to every element of that column; missing components
    /// add nothing.
    #[allow(dead_code)]
    pub fn add_vector(self, v: &[f32]) -> Self {
        self.map(|el, _, col| el + v.get(col).copied().unwrap_or(0.0))
    }

    #[allow(dead_code)]
    pub fn add_matrix(self, other: &Matrix) -> Self {
        if self.is_empty() || other.is_empty() {
            return self;
        }
        assert_eq!(
            (self.rows, self.cols),
            (other.rows, other.cols),
            "matrix sum requires matching shapes"
        );

        self.map(|el, row, col| el + other.at(row, col))
    }

    #[allow(dead_code)]
    pub fn mul_scalar(self, n: f32) -> Self {
        self.map(|el, _, _| el * n)
    }

    /// Row dot products against `v`, with missing components defaulting to
    /// 1.0. The default is what makes a 4x4 affine transform applied to a
    /// 3-component point behave as a homogeneous point transform.
    pub fn mul_vector(&self, v: &[f32]) -> Vec<f32> {
        (0..self.rows)
            .map(|row| {
                (0..self.cols)
                    .map(|col| self.at(row, col) * v.get(col).copied().unwrap_or(1.0))
                    .sum()
            })
            .collect()
    }

    pub fn mul_matrix(self, other: &Matrix) -> Self {
        if self.is_empty() || other.is_empty() {
            return self;
        }
        assert_eq!(
            self.cols, other.rows,
            "matrix product requires inner dimensions to match"
        );

        let mut product = Self::new(self.rows, other.cols);
        for row in 0..self.rows {
            for col in 0..other.cols {
                let mut acc = 0.0;
                for k in 0..self.cols {
                    acc += self.at(row, k) * other.at(k, col);
                }
                product.set(row, col, acc);
            }
        }
        product
    }

    /// Right-multiplies a rotation of `angle` degrees around the given axis.
    /// A near-zero axis leaves the matrix unchanged instead of poisoning it
    /// with NaN.
    pub fn rotate(self, angle: f32, x: f32, y: f32, z: f32) -> Self {
        let (s, c) = angle.to_radians().sin_cos();
        let t = 1.0 - c;

        let len = (x * x + y * y + z * z).sqrt();
        if len <= f32::EPSILON {
            return self;
        }
        let (x, y, z) = (x / len, y / len, z / len);

        self.mul_matrix(&Self::from_rows([
            [t * x * x + c, t * x * y - s * z, t * x * z + s * y, 0.0],
            [t * x * y + s * z, t * y * y + c, t * y * z - s * x, 0.0],
            [t * x * z - s * y, t * y * z + s * x, t * z * z + c, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]))
    }

    pub fn scale(self, x: f32, y: f32, z: f32) -> Self {
        self.mul_matrix(&Self::from_rows([
            [x, 0.0, 0.0, 0.0],
            [0.0, y, 0.0, 0.0],
            [0.0, 0.0, z, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]))
    }

    /// Adds to the translation column of a 4x4 affine matrix.
    pub fn shift(mut self, x: f32, y: f32, z: f32) -> Self {
        if self.rows < 3 || self.cols < 4 {
            return self;
        }

        self.data[3] += x;
        self.data[self.cols + 3] += y;
        self.data[2 * self.cols + 3] += z;
        self
    }

    /// Sets the translation column of a 4x4 affine matrix.
    pub fn translate(mut self, x: f32, y: f32, z: f32) -> Self {
        if self.rows < 3 || self.cols < 4 {
            return self;
        }

        self.data[3] = x;
        self.data[self.cols + 3] = y;
        self.data[2 * self.cols + 3] = z;
        self
    }

    pub fn transpose(&self) -> Self {
        let mut transposed = Self::new(self.cols, self.rows);
        for row in 0..self.rows {
            for col in 0..self.cols {
                transposed.set(col, row, self.at(row, col));
            }
        }
        transposed
    }

    /// Elements in row-major order, or column-major when `transpose` is set.
    #[allow(dead_code)]
    pub fn flatten(&self, transpose: bool) -> Vec<f32> {
        if transpose {
            self.transpose().data
        } else {
            self.data.clone()
        }
    }

    /// The column-major array a mat4 uniform upload expects.
    pub fn to_uniform(&self) -> [[f32; 4]; 4] {
        assert!(
            self.rows == 4 && self.cols == 4,
            "uniform upload requires a 4x4 matrix"
        );

        let mut columns = [[0.0; 4]; 4];
        for (col, column) in columns.iter_mut().enumerate() {
            for (row, cell) in column.iter_mut().enumerate() {
                *cell = self.at(row, col);
            }
        }
        columns
    }
}
