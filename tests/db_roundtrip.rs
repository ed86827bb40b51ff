use constdb::{DbReader, DbWriter, Error};
use test_log::test;

fn host_pairs() -> Vec<(String, String)> {
    (0..255u32)
        .map(|i| {
            (
                format!("host-{i:03}.example.com"),
                format!("192.168.{}.{}", i / 16, (i % 16) + 1),
            )
        })
        .collect()
}

#[test]
fn db_round_trip_hostnames() -> constdb::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("hosts.db");

    let pairs = host_pairs();

    let mut writer = DbWriter::create(&path)?;
    let added = writer.add_all(pairs.iter().map(|(k, v)| (k.as_bytes(), v.as_bytes())))?;
    assert_eq!(added, 255);
    assert_eq!(writer.len(), 255);

    writer.freeze(2.0)?;

    let reader = DbReader::open(&path, 64)?;
    assert_eq!(reader.len(), 255);

    for (host, ip) in &pairs {
        let value = reader.find(host.as_bytes())?;
        assert_eq!(&*value, ip.as_bytes());
    }

    // Keys that were never inserted must not resolve, even when the
    // perfect hash happens to map them onto a valid slot
    for i in 0..50 {
        let foreign = format!("never-inserted-{i}.example.org");
        assert!(matches!(
            reader.find(foreign.as_bytes()),
            Err(Error::KeyNotFound)
        ));
    }

    Ok(())
}

#[test]
fn db_duplicate_keys_are_stored_once() -> constdb::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dups.db");

    let mut writer = DbWriter::create(&path)?;
    assert!(writer.add(b"mirror", b"first")?);
    assert!(!writer.add(b"mirror", b"second")?);
    assert!(writer.add(b"other", b"value")?);
    assert_eq!(writer.len(), 2);

    writer.freeze(2.0)?;

    let reader = DbReader::open(&path, 0)?;
    assert_eq!(reader.len(), 2);

    // The first value wins
    assert_eq!(&*reader.find(b"mirror")?, b"first".as_slice());

    Ok(())
}

#[test]
fn db_binary_keys_and_values() -> constdb::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("binary.db");

    let key = [0u8, 255, 1, 254, 2];
    let value = vec![0u8; 4096];

    let mut writer = DbWriter::create(&path)?;
    writer.add(&key, &value)?;
    writer.add(b"\x00", b"\x00")?;
    writer.freeze(2.0)?;

    let reader = DbReader::open(&path, 0)?;
    assert_eq!(&*reader.find(&key)?, value.as_slice());
    assert_eq!(&*reader.find(b"\x00")?, b"\x00".as_slice());

    Ok(())
}

#[test]
fn db_failed_lookup_leaves_reader_usable() -> constdb::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("usable.db");

    let mut writer = DbWriter::create(&path)?;
    writer.add(b"present", b"yes")?;
    writer.freeze(2.0)?;

    let reader = DbReader::open(&path, 0)?;

    assert!(reader.find(b"absent").is_err());
    assert_eq!(&*reader.find(b"present")?, b"yes".as_slice());
    assert!(reader.find(b"absent-again").is_err());
    assert_eq!(&*reader.find(b"present")?, b"yes".as_slice());

    Ok(())
}

#[test]
fn db_empty_database_round_trip() -> constdb::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.db");

    let mut writer = DbWriter::create(&path)?;
    writer.freeze(2.0)?;

    let reader = DbReader::open(&path, 0)?;
    assert!(reader.is_empty());
    assert!(matches!(reader.find(b"any"), Err(Error::KeyNotFound)));

    Ok(())
}

#[test]
fn db_survives_reopen() -> constdb::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("reopen.db");

    let mut writer = DbWriter::create(&path)?;
    for i in 0..100u32 {
        writer.add(format!("k{i}").as_bytes(), format!("v{i}").as_bytes())?;
    }
    writer.freeze(2.0)?;

    // Lookups must agree across independent opens of the same file
    for _ in 0..3 {
        let reader = DbReader::open(&path, 16)?;
        for i in (0..100u32).step_by(7) {
            assert_eq!(
                &*reader.find(format!("k{i}").as_bytes())?,
                format!("v{i}").as_bytes()
            );
        }
    }

    Ok(())
}
