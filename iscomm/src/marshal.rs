//! Bounded copies between a data set structure, seen as bytes, and the data of an ISB
//! data packet. The packet's data covers `header.size` bytes starting at `header.offset`
//! of the structure.

use crate::{comm::CommInstance, error::CommError, packet::DataHeader};

fn struct_range(
    header: &DataHeader,
    struct_len: usize,
    max_size: usize,
) -> Result<core::ops::Range<usize>, CommError> {
    let offset = header.offset as usize;
    let size = header.size as usize;
    let max = max_size.min(struct_len);
    match offset.checked_add(size) {
        Some(end) if end <= max => Ok(offset..end),
        _ => Err(CommError::StructSizeMismatch { offset, size, max }),
    }
}

fn check_data_len(data: &[u8], size: usize) -> Result<(), CommError> {
    if data.len() < size {
        return Err(CommError::BufferTooSmall {
            required: size,
            available: data.len(),
        });
    }
    Ok(())
}

/// Copies the part of `structure` described by `header` into `data`
pub fn copy_struct_to_data(
    data: &mut [u8],
    header: &DataHeader,
    structure: &[u8],
    max_size: usize,
) -> Result<(), CommError> {
    let range = struct_range(header, structure.len(), max_size)?;
    check_data_len(data, range.len())?;
    data[..range.len()].copy_from_slice(&structure[range]);
    Ok(())
}

/// Copies packet `data` into the part of `structure` described by `header`
pub fn copy_data_to_struct(
    structure: &mut [u8],
    header: &DataHeader,
    data: &[u8],
    max_size: usize,
) -> Result<(), CommError> {
    let range = struct_range(header, structure.len(), max_size)?;
    check_data_len(data, range.len())?;
    let len = range.len();
    structure[range].copy_from_slice(&data[..len]);
    Ok(())
}

/// Like [`copy_data_to_struct`] for a packet body that still starts with its data header
pub fn copy_data_to_struct_hdr(
    structure: &mut [u8],
    header: &DataHeader,
    body: &[u8],
    max_size: usize,
) -> Result<(), CommError> {
    let data = body.get(DataHeader::SIZE..).ok_or(CommError::BufferTooSmall {
        required: DataHeader::SIZE,
        available: body.len(),
    })?;
    copy_data_to_struct(structure, header, data, max_size)
}

impl CommInstance<'_> {
    /// Copies the data of the last received data packet into `structure`
    pub fn copy_to_struct(&self, structure: &mut [u8], max_size: usize) -> Result<(), CommError> {
        let data = self.data().ok_or(CommError::NoData)?;
        copy_data_to_struct(structure, self.data_header(), data, max_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_copy_honours_offset() {
        let mut structure = [0u8; 8];
        let header = DataHeader::new(1, 2, 3);
        copy_data_to_struct(&mut structure, &header, &[7, 8, 9], 8).unwrap();
        assert_eq!(structure, [0, 0, 7, 8, 9, 0, 0, 0]);

        let mut data = [0u8; 3];
        copy_struct_to_data(&mut data, &header, &structure, 8).unwrap();
        assert_eq!(data, [7, 8, 9]);
    }

    #[test]
    fn overflow_is_refused_without_copy() {
        let mut structure = [0u8; 8];
        let header = DataHeader::new(1, 6, 4);
        assert_eq!(
            copy_data_to_struct(&mut structure, &header, &[1, 2, 3, 4], 8),
            Err(CommError::StructSizeMismatch {
                offset: 6,
                size: 4,
                max: 8
            })
        );
        assert_eq!(structure, [0; 8]);

        // max_size tighter than the structure
        let header = DataHeader::new(1, 0, 6);
        assert!(matches!(
            copy_data_to_struct(&mut structure, &header, &[1; 6], 4),
            Err(CommError::StructSizeMismatch { max: 4, .. })
        ));
        assert!(matches!(
            copy_data_to_struct(&mut structure, &header, &[1; 2], 8),
            Err(CommError::BufferTooSmall { .. })
        ));
        assert_eq!(structure, [0; 8]);
    }

    #[test]
    fn body_with_header() {
        let header = DataHeader::new(1, 0, 2);
        let mut body = [0u8; 14];
        body[12..].copy_from_slice(&[5, 6]);
        let mut structure = [0u8; 2];
        copy_data_to_struct_hdr(&mut structure, &header, &body, 2).unwrap();
        assert_eq!(structure, [5, 6]);
        assert!(copy_data_to_struct_hdr(&mut structure, &header, &body[..4], 2).is_err());
    }

    #[test]
    fn instance_without_data() {
        let mut rx = [0u8; 16];
        let mut tx = [0u8; 16];
        let comm = CommInstance::new(&mut rx, &mut tx);
        let mut structure = [0u8; 4];
        assert_eq!(
            comm.copy_to_struct(&mut structure, 4),
            Err(CommError::NoData)
        );
    }
}
