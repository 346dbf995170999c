//! Tests for the downloader command surface.

use crate::downloader::test_helpers::*;
use crate::error::Error;
use crate::types::{Event, MediaChoice, Status, UserId};
