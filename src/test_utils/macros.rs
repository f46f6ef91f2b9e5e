/// Asserts that the next stream item equals `$expected`.
///
/// Waits at most `timeout` seconds (default 5) and panics if the stream ends first.
#[macro_export]
macro_rules! assert_next_event {
    ($stream: expr, $expected: expr) => {
        $crate::assert_next_event!($stream, $expected, timeout = 5)
    };
    ($stream: expr, $expected: expr, timeout = $secs: expr) => {
        let message = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::next(&mut $stream),
        )
        .await
        .expect("timed out");
        let expected = $expected;
        match message {
            std::option::Option::Some(event) => {
                assert_eq!(event, expected, "Expected {:?}, got {:?}", expected, event);
            }
            std::option::Option::None => {
                panic!("Expected {:?}, but stream was closed", expected);
            }
        }
    };
}

/// Asserts that the next stream item matches `$pattern`.
#[macro_export]
macro_rules! assert_next_matches {
    ($stream: expr, $pattern: pat) => {
        $crate::assert_next_matches!($stream, $pattern, timeout = 5)
    };
    ($stream: expr, $pattern: pat, timeout = $secs: expr) => {
        let message = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::next(&mut $stream),
        )
        .await
        .expect("timed out");
        match message {
            std::option::Option::Some(event) => {
                assert!(
                    matches!(event, $pattern),
                    "Expected {}, got {:?}",
                    stringify!($pattern),
                    event
                );
            }
            std::option::Option::None => {
                panic!("Expected {}, but stream was closed", stringify!($pattern));
            }
        }
    };
}

/// Asserts that the stream has ended.
#[macro_export]
macro_rules! assert_closed {
    ($stream: expr) => {
        $crate::assert_closed!($stream, timeout = 5)
    };
    ($stream: expr, timeout = $secs: expr) => {
        let message = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::next(&mut $stream),
        )
        .await
        .expect("timed out");
        assert!(message.is_none(), "Expected stream to be closed, got {:?}", message)
    };
}

/// Drains the stream until it ends, returning every item.
#[macro_export]
macro_rules! collect_events {
    ($stream: expr) => {
        $crate::collect_events!($stream, timeout = 5)
    };
    ($stream: expr, timeout = $secs: expr) => {
        tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::collect::<Vec<_>>(&mut $stream),
        )
        .await
        .expect("timed out")
    };
}
