use crate::error::{DescriptorError, Result};

/// The numeric type stored in a [Matrix].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    U8,
    U16,
    I16,
    I32,
    F32,
    F64,
}

impl ElementType {
    fn tag(self) -> u8 {
        match self {
            ElementType::U8 => 0,
            ElementType::U16 => 1,
            ElementType::I16 => 2,
            ElementType::I32 => 3,
            ElementType::F32 => 4,
            ElementType::F64 => 5,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ElementType::U8),
            1 => Some(ElementType::U16),
            2 => Some(ElementType::I16),
            3 => Some(ElementType::I32),
            4 => Some(ElementType::F32),
            5 => Some(ElementType::F64),
            _ => None,
        }
    }

    /// Size in bytes of one element.
    pub fn size(self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::U16 | ElementType::I16 => 2,
            ElementType::I32 | ElementType::F32 => 4,
            ElementType::F64 => 8,
        }
    }
}

/// Typed element storage of a [Matrix].
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// A numeric type that can be stored in a [Matrix].
pub trait Element: Copy {
    const TYPE: ElementType;

    fn into_data(values: Vec<Self>) -> MatrixData;

    fn slice(data: &MatrixData) -> Option<&[Self]>;

    fn to_f32(self) -> f32;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const TYPE: ElementType = ElementType::$variant;

            fn into_data(values: Vec<Self>) -> MatrixData {
                MatrixData::$variant(values)
            }

            fn slice(data: &MatrixData) -> Option<&[Self]> {
                match data {
                    MatrixData::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn to_f32(self) -> f32 {
                self as f32
            }
        }
    };
}

impl_element!(u8, U8);
impl_element!(u16, U16);
impl_element!(i16, I16);
impl_element!(i32, I32);
impl_element!(f32, F32);
impl_element!(f64, F64);

impl MatrixData {
    pub fn element_type(&self) -> ElementType {
        match self {
            MatrixData::U8(_) => ElementType::U8,
            MatrixData::U16(_) => ElementType::U16,
            MatrixData::I16(_) => ElementType::I16,
            MatrixData::I32(_) => ElementType::I32,
            MatrixData::F32(_) => ElementType::F32,
            MatrixData::F64(_) => ElementType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MatrixData::U8(v) => v.len(),
            MatrixData::U16(v) => v.len(),
            MatrixData::I16(v) => v.len(),
            MatrixData::I32(v) => v.len(),
            MatrixData::F32(v) => v.len(),
            MatrixData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Casts every element to `f32`. Values are not rescaled.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        fn cast<T: Element>(values: &[T]) -> Vec<f32> {
            values.iter().map(|v| v.to_f32()).collect()
        }
        match self {
            MatrixData::U8(v) => cast(v),
            MatrixData::U16(v) => cast(v),
            MatrixData::I16(v) => cast(v),
            MatrixData::I32(v) => cast(v),
            MatrixData::F32(v) => v.clone(),
            MatrixData::F64(v) => cast(v),
        }
    }
}

/// A dense, row-major, runtime-typed 2D buffer with interleaved channels.
///
/// The same type carries input images, query coordinate matrices and descriptor
/// outputs. Element `(row, col, channel)` lives at
/// `(row * cols + col) * channels + channel`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    channels: usize,
    data: MatrixData,
}

impl Default for Matrix {
    /// Creates the empty (unset) matrix.
    fn default() -> Matrix {
        Matrix::empty()
    }
}

impl Matrix {
    /// An unset matrix with no rows, columns or elements.
    ///
    /// Passing it as an output buffer asks the callee to allocate the result.
    pub fn empty() -> Self {
        Matrix {
            rows: 0,
            cols: 0,
            channels: 1,
            data: MatrixData::F32(Vec::new()),
        }
    }

    /// Creates a single-channel matrix from row-major values.
    pub fn new<T: Element>(rows: usize, cols: usize, values: Vec<T>) -> Result<Self> {
        Self::with_channels(rows, cols, 1, values)
    }

    /// Creates a matrix with `channels` interleaved values per element.
    pub fn with_channels<T: Element>(
        rows: usize,
        cols: usize,
        channels: usize,
        values: Vec<T>,
    ) -> Result<Self> {
        if channels == 0 {
            return Err(DescriptorError::ShapeMismatch(
                "a matrix needs at least one channel".to_string(),
            ));
        }
        let expected = element_count(rows, cols, channels).ok_or_else(|| {
            DescriptorError::ShapeMismatch(format!(
                "{rows}x{cols}x{channels} matrix has more elements than fit in memory"
            ))
        })?;
        if values.len() != expected {
            return Err(DescriptorError::ShapeMismatch(format!(
                "{rows}x{cols}x{channels} matrix needs {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Matrix {
            rows,
            cols,
            channels,
            data: T::into_data(values),
        })
    }

    /// A zero-filled single-channel `F32` matrix.
    pub fn zeros_f32(rows: usize, cols: usize) -> Result<Self> {
        let count = element_count(rows, cols, 1).ok_or_else(|| {
            DescriptorError::ShapeMismatch(format!("{rows}x{cols} matrix has more elements than fit in memory"))
        })?;
        Ok(Matrix {
            rows,
            cols,
            channels: 1,
            data: MatrixData::F32(vec![0.0; count]),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn data(&self) -> &MatrixData {
        &self.data
    }

    /// True when the matrix holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the elements as a slice of `T`, or `None` if the type differs.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(&self.data)
    }

    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        self.as_slice::<f32>()
    }

    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match &mut self.data {
            MatrixData::F32(values) => Some(values.as_mut_slice()),
            _ => None,
        }
    }

    /// Returns row `row` of a single-channel `F32` matrix.
    pub fn row_f32(&self, row: usize) -> Option<&[f32]> {
        if row >= self.rows || self.channels != 1 {
            return None;
        }
        let start = row * self.cols;
        self.as_f32_slice().map(|values| &values[start..start + self.cols])
    }

    /// Appends the rows of `other` below the rows of `self`.
    ///
    /// Both matrices must be single-channel `F32`. An empty `self` adopts the
    /// column count of `other`.
    pub fn push_rows_f32(&mut self, other: &Matrix) -> Result<()> {
        let incoming = other.as_f32_slice().ok_or_else(|| {
            DescriptorError::ShapeMismatch(format!(
                "can only stack F32 rows, got {:?}",
                other.element_type()
            ))
        })?;
        if self.is_empty() {
            *self = other.clone();
            return Ok(());
        }
        if self.cols != other.cols || self.channels != 1 || other.channels != 1 {
            return Err(DescriptorError::ShapeMismatch(format!(
                "cannot stack {}x{} rows onto {}x{}",
                other.rows, other.cols, self.rows, self.cols
            )));
        }
        let element_type = self.element_type();
        let MatrixData::F32(values) = &mut self.data else {
            return Err(DescriptorError::ShapeMismatch(format!(
                "can only stack onto F32 rows, got {element_type:?}"
            )));
        };
        values.extend_from_slice(incoming);
        self.rows += other.rows;
        Ok(())
    }

    /// Serializes the matrix to little-endian bytes.
    ///
    /// Layout: element tag (1 byte), rows, cols and channels (u64 each),
    /// followed by the elements.
    pub fn serialize(&self) -> Vec<u8> {
        let element_type = self.element_type();
        let mut data = Vec::with_capacity(25 + self.data.len() * element_type.size());
        data.push(element_type.tag());
        data.extend_from_slice(&(self.rows as u64).to_le_bytes());
        data.extend_from_slice(&(self.cols as u64).to_le_bytes());
        data.extend_from_slice(&(self.channels as u64).to_le_bytes());
        match &self.data {
            MatrixData::U8(v) => data.extend_from_slice(v),
            MatrixData::U16(v) => v.iter().for_each(|x| data.extend_from_slice(&x.to_le_bytes())),
            MatrixData::I16(v) => v.iter().for_each(|x| data.extend_from_slice(&x.to_le_bytes())),
            MatrixData::I32(v) => v.iter().for_each(|x| data.extend_from_slice(&x.to_le_bytes())),
            MatrixData::F32(v) => v.iter().for_each(|x| data.extend_from_slice(&x.to_le_bytes())),
            MatrixData::F64(v) => v.iter().for_each(|x| data.extend_from_slice(&x.to_le_bytes())),
        }
        data
    }

    /// Deserializes a matrix written by [Matrix::serialize].
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        if data.len() < 25 {
            return Err(DescriptorError::Corrupt(format!(
                "header needs 25 bytes, got {}",
                data.len()
            )));
        }
        let element_type = ElementType::from_tag(data[0])
            .ok_or_else(|| DescriptorError::Corrupt(format!("unknown element tag {}", data[0])))?;

        let read_u64 = |offset: usize| -> usize {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&data[offset..offset + 8]);
            u64::from_le_bytes(bytes) as usize
        };
        let rows = read_u64(1);
        let cols = read_u64(9);
        let channels = read_u64(17);
        if channels == 0 {
            return Err(DescriptorError::Corrupt("zero channels".to_string()));
        }

        let payload = &data[25..];
        let size = element_type.size();
        let byte_len = element_count(rows, cols, channels)
            .and_then(|n| n.checked_mul(size))
            .ok_or_else(|| DescriptorError::Corrupt("payload size overflows".to_string()))?;
        if payload.len() != byte_len {
            return Err(DescriptorError::Corrupt(format!(
                "{rows}x{cols}x{channels} {element_type:?} matrix needs {byte_len} payload bytes, got {}",
                payload.len()
            )));
        }

        let chunks = payload.chunks_exact(size);
        let data = match element_type {
            ElementType::U8 => MatrixData::U8(payload.to_vec()),
            ElementType::U16 => {
                MatrixData::U16(chunks.map(|c| u16::from_le_bytes([c[0], c[1]])).collect())
            }
            ElementType::I16 => {
                MatrixData::I16(chunks.map(|c| i16::from_le_bytes([c[0], c[1]])).collect())
            }
            ElementType::I32 => MatrixData::I32(
                chunks
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            ElementType::F32 => MatrixData::F32(
                chunks
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            ElementType::F64 => MatrixData::F64(
                chunks
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
        };

        Ok(Matrix {
            rows,
            cols,
            channels,
            data,
        })
    }
}

/// `rows * cols * channels`, or `None` if the product overflows `usize`.
fn element_count(rows: usize, cols: usize, channels: usize) -> Option<usize> {
    rows.checked_mul(cols)?.checked_mul(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_wrong_length() {
        let err = Matrix::new(2, 3, vec![0u8; 5]).unwrap_err();
        assert!(matches!(err, DescriptorError::ShapeMismatch(_)));
    }

    #[test]
    fn empty_matrix_is_unset() {
        let m = Matrix::empty();
        assert!(m.is_empty());
        assert_eq!(m.rows(), 0);
        assert_eq!(Matrix::default(), m);
    }

    #[test]
    fn cast_to_f32_keeps_source_range() {
        let m = Matrix::new(1, 3, vec![0u16, 1000, 65535]).unwrap();
        assert_eq!(m.data().to_f32_vec(), vec![0.0, 1000.0, 65535.0]);
    }

    #[test]
    fn rows_of_f32_matrix() {
        let m = Matrix::new(2, 2, vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(m.row_f32(1), Some(&[3.0f32, 4.0][..]));
        assert_eq!(m.row_f32(2), None);
        let ints = Matrix::new(1, 1, vec![1i32]).unwrap();
        assert_eq!(ints.row_f32(0), None);
    }

    #[test]
    fn stacking_rows() {
        let mut m = Matrix::empty();
        m.push_rows_f32(&Matrix::new(1, 2, vec![1.0f32, 2.0]).unwrap()).unwrap();
        m.push_rows_f32(&Matrix::new(2, 2, vec![3.0f32, 4.0, 5.0, 6.0]).unwrap()).unwrap();
        assert_eq!(m.rows(), 3);
        assert_eq!(m.row_f32(2), Some(&[5.0f32, 6.0][..]));

        let wrong = Matrix::new(1, 3, vec![0.0f32; 3]).unwrap();
        assert!(m.push_rows_f32(&wrong).is_err());
    }

    #[test]
    fn serialized_matrix_reads_back() {
        let m = Matrix::with_channels(2, 1, 2, vec![-1i16, 2, 300, -400]).unwrap();
        let bytes = m.serialize();
        assert_eq!(bytes.len(), 25 + 4 * 2);
        assert_eq!(Matrix::deserialize(&bytes).unwrap(), m);
    }

    #[test]
    fn deserialize_rejects_truncated_payload() {
        let m = Matrix::new(2, 2, vec![1.0f32; 4]).unwrap();
        let bytes = m.serialize();
        let err = Matrix::deserialize(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, DescriptorError::Corrupt(_)));
        assert!(Matrix::deserialize(&[9u8; 25]).is_err());
    }

    #[test]
    fn deserialize_rejects_header_with_oversized_payload() {
        let mut header = vec![ElementType::F32.tag()];
        header.extend_from_slice(&(1u64 << 62).to_le_bytes());
        header.extend_from_slice(&1u64.to_le_bytes());
        header.extend_from_slice(&1u64.to_le_bytes());
        assert_eq!(header.len(), 25);
        let err = Matrix::deserialize(&header).unwrap_err();
        assert!(matches!(err, DescriptorError::Corrupt(_)));
    }

    #[test]
    fn overflowing_shapes_are_rejected() {
        let err = Matrix::new(1usize << 63, 2, Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, DescriptorError::ShapeMismatch(_)));
        assert!(matches!(
            Matrix::with_channels(usize::MAX, 1, 2, Vec::<f32>::new()),
            Err(DescriptorError::ShapeMismatch(_))
        ));
        assert!(matches!(
            Matrix::zeros_f32(usize::MAX, 2),
            Err(DescriptorError::ShapeMismatch(_))
        ));
        assert_eq!(Matrix::zeros_f32(2, 3).unwrap().as_f32_slice().unwrap(), &[0.0; 6]);
    }
}
