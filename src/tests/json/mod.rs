//! JSON reader tests.

mod reader_tests;
