//! The fixed-schema row and its fixed-width encoding.
//!
//! ```text
//! +-----------+------------------+---------------------+
//! | id (4B)   | username (32B)   | email (255B)        |
//! +-----------+------------------+---------------------+
//!   ^ offset 0  ^ offset 4         ^ offset 36
//! ```
//!
//! Strings are left-justified and padded with zero bytes. Decoding stops at the first
//! zero byte, so a value that fills its column exactly round-trips unchanged. Zero
//! bytes inside a value would be indistinguishable from padding and are rejected.

use std::fmt::Display;

use crate::error::RowError;

pub const COLUMN_USERNAME_SIZE: usize = 32;
pub const COLUMN_EMAIL_SIZE: usize = 255;

pub const ID_SIZE: usize = std::mem::size_of::<u32>();
pub const USERNAME_SIZE: usize = COLUMN_USERNAME_SIZE;
pub const EMAIL_SIZE: usize = COLUMN_EMAIL_SIZE;

pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

/// One record of the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    id: u32,
    username: String,
    email: String,
}

impl Row {
    /// Build a row, rejecting strings that do not fit their columns
    pub fn new(id: u32, username: &str, email: &str) -> Result<Self, RowError> {
        if username.contains('\0') {
            return Err(RowError::EmbeddedNul { column: "username" });
        }
        if email.contains('\0') {
            return Err(RowError::EmbeddedNul { column: "email" });
        }
        if username.len() > COLUMN_USERNAME_SIZE {
            return Err(RowError::UsernameTooLong {
                len: username.len(),
                max: COLUMN_USERNAME_SIZE,
            });
        }
        if email.len() > COLUMN_EMAIL_SIZE {
            return Err(RowError::EmailTooLong {
                len: email.len(),
                max: COLUMN_EMAIL_SIZE,
            });
        }
        Ok(Self {
            id,
            username: username.to_string(),
            email: email.to_string(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Write the row into `dest`. The whole width is written, including the zero
    /// padding.
    pub fn encode(&self, dest: &mut [u8; ROW_SIZE]) {
        dest[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_be_bytes());
        write_column(
            &mut dest[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE],
            self.username.as_bytes(),
        );
        write_column(
            &mut dest[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE],
            self.email.as_bytes(),
        );
    }

    /// Read a row back out of its encoding
    pub fn decode(src: &[u8; ROW_SIZE]) -> Self {
        let mut id_bytes = [0u8; ID_SIZE];
        id_bytes.copy_from_slice(&src[ID_OFFSET..ID_OFFSET + ID_SIZE]);
        Self {
            id: u32::from_be_bytes(id_bytes),
            username: read_column(&src[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]),
            email: read_column(&src[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]),
        }
    }
}

impl Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username, self.email)
    }
}

fn write_column(column: &mut [u8], value: &[u8]) {
    column[..value.len()].copy_from_slice(value);
    column[value.len()..].fill(0);
}

fn read_column(column: &[u8]) -> String {
    let end = column.iter().position(|b| *b == 0).unwrap_or(column.len());
    String::from_utf8_lossy(&column[..end]).into_owned()
}
