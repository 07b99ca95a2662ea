//! Matching-engine test suite.


mod matching_tests;
